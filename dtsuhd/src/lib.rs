#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! A DTS-UHD frame opens with a 32-bit syncword (sync frames carry the full
//! stream configuration, non-sync frames only deltas), followed by a
//! variable-length frame table of contents (FTOC) describing an array of
//! sized chunks. Metadata chunks carry nested object lists with per-object
//! representation and channel-activity descriptors. Two CRC-16 scopes
//! protect the FTOC and individual chunks.
//!
//! ## Quick Start
//!
//! 1. Feed bitstream data to a [`process::extract::Extractor`] to obtain
//!    aligned frames, or
//! 2. Parse frames directly with a [`process::parse::Parser`], or
//! 3. Open a file through [`process::demux::Demuxer`] to obtain the stream
//!    descriptor and raw packets.
//!
//! ```rust
//! use dtsuhd::process::extract::Extractor;
//!
//! let mut extractor = Extractor::default();
//! let data: &[u8] = &[]; // bitstream data
//! extractor.push_bytes(data);
//!
//! for frame in extractor {
//!     match frame {
//!         Ok(frame) => println!("frame of {} bytes", frame.as_ref().len()),
//!         Err(e) => eprintln!("extraction error: {e}"),
//!     }
//! }
//! ```

/// Processing pipelines for DTS-UHD bitstreams.
///
/// 1. **Frame extraction** ([`process::extract`]): aligns a byte stream to
///    syncwords and emits one frame at a time.
/// 2. **Frame parsing** ([`process::parse`]): walks a single frame and
///    maintains the cross-frame stream state.
/// 3. **Demultiplexing** ([`process::demux`]): locates the payload inside a
///    container file and publishes raw packets plus the sample entry
///    descriptor.
pub mod process;

/// Data structures for DTS-UHD bitstream elements.
///
/// - **Syncwords and stream parameters** ([`structs::sync`])
/// - **Audio presentations** ([`structs::presentation`])
/// - **Chunk tables and navigation** ([`structs::navi`])
/// - **Metadata chunks and objects** ([`structs::md01`])
/// - **Sample entry descriptor** ([`structs::descriptor`])
pub mod structs;

/// Supporting infrastructure.
///
/// - **Bitstream reading** ([`utils::bitstream`])
/// - **CRC validation** ([`utils::crc`])
/// - **Error types** ([`utils::errors`])
/// - **Buffer recycling** ([`utils::buffer_pool`])
pub mod utils;
