//! Supporting infrastructure.
//!
//! Provides bitstream reading, CRC validation, error types, and buffer
//! management for the parsing pipelines.

pub mod bitstream;
pub mod buffer_pool;
pub mod crc;
pub mod errors;
