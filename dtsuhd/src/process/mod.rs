//! Processing pipelines for DTS-UHD bitstreams.
//!
//! Provides the [`Extractor`](extract::Extractor) for aligning a byte
//! stream to frames, the [`Parser`](parse::Parser) for walking individual
//! frames, and the [`Demuxer`](demux::Demuxer) for one-shot payload
//! extraction with descriptor reporting.

/// Frame extraction from continuous byte streams.
pub mod extract;

/// Single-frame parsing and cross-frame stream state.
pub mod parse;

/// Container location, probing, and raw packet demultiplexing.
pub mod demux;
