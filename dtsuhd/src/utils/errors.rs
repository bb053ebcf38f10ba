use thiserror::Error;

/// Outcome of parsing a single frame that did not produce frame info.
///
/// `Incomplete` is recoverable by supplying more bytes; `NoSync` by
/// skipping to the next syncword; `Invalid` aborts the current frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame extends past the end of the buffer")]
    Incomplete,

    #[error("non-sync frame received before any sync frame")]
    NoSync,

    #[error(transparent)]
    Invalid(#[from] InvalidFrameError),
}

impl FrameError {
    /// True when the caller can retry the same frame with more data.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FrameError::Incomplete)
    }
}

/// Bitstream contradictions that invalidate the current frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidFrameError {
    #[error("FTOC CRC residue is non-zero over {bytes} bytes")]
    FtocCrcMismatch { bytes: usize },

    #[error("chunk {index} CRC residue is non-zero over {bytes} bytes")]
    ChunkCrcMismatch { index: usize, bytes: usize },

    #[error("reserved base duration code in stream parameters")]
    InvalidBaseDuration,

    #[error("reserved clock rate code in stream parameters")]
    InvalidClockRate,

    #[error("metadata chunk presentation index {0} out of range")]
    PresIndexOutOfRange(u32),
}

/// Errors surfaced by the streaming extractor.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    #[error("insufficient buffer data for frame extraction")]
    InsufficientData,

    #[error("invalid frame in stream: {0}")]
    InvalidFrame(#[from] InvalidFrameError),
}

/// Errors surfaced by the one-shot demuxer.
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("I/O error reading stream")]
    Io(#[from] std::io::Error),

    #[error("no syncword found in the stream head")]
    SyncNotFound,

    #[error("unable to parse stream header frame: {0}")]
    Header(#[from] FrameError),

    #[error("stream header frame carries no descriptor")]
    MissingDescriptor,
}
