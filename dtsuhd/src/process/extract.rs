use std::sync::Arc;

use log::{debug, error};

use crate::process::parse::{FrameInfo, Parser};
use crate::structs::sync::{is_syncword, read_be32, MAX_FRAME_SIZE};
use crate::utils::buffer_pool::BufferPool;
use crate::utils::errors::{ExtractError, FrameError};

/// Size of the extraction window in bytes. The window never grows;
/// appending beyond it compacts the unconsumed tail to the front.
pub const WINDOW_SIZE: usize = MAX_FRAME_SIZE * 128;

/// Extracts DTS-UHD frames from a continuous byte stream.
///
/// Buffers pushed input in a fixed window, keeps the window aligned to
/// the next syncword, and emits one parsed frame per iteration step. On
/// an invalid frame the extractor reports the error once and resumes at
/// the next syncword.
///
/// # Example
///
/// ```rust,no_run
/// use dtsuhd::process::extract::Extractor;
///
/// let mut extractor = Extractor::default();
/// let data = std::fs::read("stream.dtsx")?;
///
/// let mut input = data.as_slice();
/// while !input.is_empty() {
///     let consumed = extractor.push_bytes(input);
///     input = &input[consumed..];
///
///     for frame in extractor.by_ref() {
///         match frame {
///             Ok(frame) => println!(
///                 "frame: {} bytes, sync: {}",
///                 frame.as_ref().len(),
///                 frame.is_sync()
///             ),
///             Err(e) => eprintln!("extraction error: {e}"),
///         }
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Extractor {
    parser: Parser,
    buf: Box<[u8]>,
    buf_offset: usize,
    buf_bytes: usize,
    frame_bytes: usize,
    buffer_pool: BufferPool,
    io_counter: usize,
    frames_processed: usize,
    error_count: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            parser: Parser::default(),
            buf: vec![0; WINDOW_SIZE].into_boxed_slice(),
            buf_offset: 0,
            buf_bytes: 0,
            frame_bytes: 0,
            buffer_pool: BufferPool::default(),
            io_counter: 0,
            frames_processed: 0,
            error_count: 0,
        }
    }
}

impl Extractor {
    /// Appends bitstream data to the window and returns the number of
    /// bytes accepted. Input beyond the free window is left for the
    /// caller to resubmit after draining frames.
    pub fn push_bytes(&mut self, data: &[u8]) -> usize {
        self.buf_offset += self.frame_bytes;
        self.frame_bytes = 0;

        // Window almost full: move the unconsumed tail to the front.
        if !data.is_empty() && self.buf_bytes + data.len() > WINDOW_SIZE {
            self.buf.copy_within(self.buf_offset..self.buf_bytes, 0);
            self.buf_bytes -= self.buf_offset;
            self.buf_offset = 0;
        }

        let copy_bytes = data.len().min(WINDOW_SIZE - self.buf_bytes);
        if copy_bytes > 0 {
            self.buf[self.buf_bytes..self.buf_bytes + copy_bytes]
                .copy_from_slice(&data[..copy_bytes]);
            self.buf_bytes += copy_bytes;
            self.io_counter += 1;
        }

        copy_bytes
    }

    /// Frames emitted so far.
    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    /// Invalid frames skipped so far.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    fn insufficient(&mut self) -> Option<Result<Frame, ExtractError>> {
        self.io_counter -= 1;
        Some(Err(ExtractError::InsufficientData))
    }
}

impl Iterator for Extractor {
    type Item = Result<Frame, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.io_counter == 0 {
            return None;
        }

        loop {
            self.buf_offset += self.frame_bytes;
            self.frame_bytes = 0;

            // Re-align the window head to a syncword.
            while self.buf_offset + 4 < self.buf_bytes
                && !is_syncword(read_be32(&self.buf[self.buf_offset..]))
            {
                self.buf_offset += 1;
            }

            if self.buf_bytes < self.buf_offset + 4 {
                return self.insufficient();
            }

            match self.parser.parse(&self.buf[self.buf_offset..self.buf_bytes]) {
                Ok(info) => {
                    self.frame_bytes = info.frame_bytes;
                    let mut data = self.buffer_pool.acquire();
                    data.extend_from_slice(
                        &self.buf[self.buf_offset..self.buf_offset + info.frame_bytes],
                    );

                    self.frames_processed += 1;
                    return Some(Ok(Frame {
                        info,
                        data: data.into(),
                    }));
                }
                Err(FrameError::Incomplete) => {
                    // A claimed frame larger than the window can never
                    // complete; discard the window and resync.
                    if self.buf_bytes - self.buf_offset >= WINDOW_SIZE {
                        error!("dropping {WINDOW_SIZE} byte window on oversized frame");
                        self.frame_bytes = self.buf_bytes - self.buf_offset;
                    }
                    return self.insufficient();
                }
                Err(FrameError::NoSync) => {
                    debug!("skipping frame candidate without prior sync");
                    self.buf_offset += 1;
                }
                Err(FrameError::Invalid(e)) => {
                    error!("invalid frame in stream: {e}");
                    self.error_count += 1;
                    self.buf_offset += 1;
                    return Some(Err(ExtractError::InvalidFrame(e)));
                }
            }
        }
    }
}

/// A single frame extracted from a bitstream, with its parsed timing.
#[derive(Debug, Clone)]
pub struct Frame {
    pub info: FrameInfo,
    pub data: Arc<[u8]>,
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Frame {
    /// True when this frame reinitializes the stream configuration.
    pub fn is_sync(&self) -> bool {
        self.info.sync
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::parse::testframe::{nonsync_frame, sync_frame};

    fn drain(extractor: &mut Extractor) -> Vec<Frame> {
        extractor
            .by_ref()
            .filter_map(|result| result.ok())
            .collect()
    }

    #[test]
    fn extracts_frames_across_push_boundaries() {
        let (sync, _) = sync_frame(1, 4);
        let (nonsync, _) = nonsync_frame(5);

        let mut stream = vec![0x11u8, 0x22, 0x33]; // leading garbage
        stream.extend_from_slice(&sync);
        stream.extend_from_slice(&nonsync);
        stream.extend_from_slice(&nonsync);

        let mut extractor = Extractor::default();
        let split = stream.len() / 2;

        assert_eq!(extractor.push_bytes(&stream[..split]), split);
        let mut frames = drain(&mut extractor);

        assert_eq!(extractor.push_bytes(&stream[split..]), stream.len() - split);
        frames.extend(drain(&mut extractor));

        assert_eq!(frames.len(), 3);
        assert!(frames[0].is_sync());
        assert!(!frames[1].is_sync());
        assert_eq!(frames[0].as_ref(), &sync[..]);
        assert_eq!(frames[1].as_ref(), &nonsync[..]);
        assert_eq!(frames[0].info.sample_count, 512);
        assert_eq!(extractor.frames_processed(), 3);
    }

    #[test]
    fn resumes_after_corrupt_frame() {
        let (sync, ftoc_bytes) = sync_frame(1, 4);
        let mut corrupt = sync.clone();
        corrupt[ftoc_bytes - 1] ^= 0x01;

        let mut stream = Vec::new();
        stream.extend_from_slice(&sync);
        stream.extend_from_slice(&corrupt);
        stream.extend_from_slice(&sync);

        let mut extractor = Extractor::default();
        assert_eq!(extractor.push_bytes(&stream), stream.len());

        let mut frames = 0;
        let mut errors = 0;
        for result in extractor.by_ref() {
            match result {
                Ok(_) => frames += 1,
                Err(ExtractError::InvalidFrame(_)) => errors += 1,
                Err(ExtractError::InsufficientData) => break,
            }
        }

        assert_eq!(frames, 2);
        assert_eq!(errors, 1);
    }

    #[test]
    fn window_never_grows_past_capacity() {
        let mut extractor = Extractor::default();
        let chunk = vec![0u8; WINDOW_SIZE];

        let accepted = extractor.push_bytes(&chunk);
        assert_eq!(accepted, WINDOW_SIZE);

        // Window is full of garbage; nothing more fits until it drains.
        assert_eq!(extractor.push_bytes(&[0u8; 16]), 0);

        while extractor.next().is_some() {}

        // The scan consumed the garbage, so compaction frees the window.
        assert_eq!(extractor.push_bytes(&[0u8; 16]), 16);
    }
}
