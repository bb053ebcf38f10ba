//! Data structures for DTS-UHD bitstream elements.
//!
//! Each module pairs the structured representation of a frame element
//! with its read function, mutating the cross-frame parser state the way
//! the frame syntax prescribes.

pub mod descriptor;
pub mod md01;
pub mod navi;
pub mod presentation;
pub mod sync;
