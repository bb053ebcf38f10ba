use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::process::parse::{FrameInfo, Parser};
use crate::structs::descriptor::DescriptorInfo;
use crate::structs::sync::{find_syncword, is_syncword, read_be32, read_be64, MAX_FRAME_SIZE};
use crate::utils::errors::DemuxError;

/// File extension conventionally carried by DTS-UHD elementary streams.
pub const FILE_EXTENSION: &str = "dtsx";

/// Highest probe score; a successful single-frame parse scores three
/// below it.
pub const PROBE_SCORE_MAX: u8 = 100;

/// Bytes examined from the head of the stream for the container header
/// and the descriptor frame.
const HEADER_BUFFER_SIZE: usize = 1024 * 1024;

/// Container chunk header: 8-byte ASCII tag plus 8-byte big-endian size.
const CHUNK_HEADER_BYTES: usize = 16;

/// Locates the "STRMDATA" payload inside a "DTSHDHDR" container file.
///
/// Returns the offset just past the payload chunk header and the payload
/// size, or `None` when the input is not a container file and should be
/// decoded as raw frames to the end of the input.
pub fn locate_strmdata(data: &[u8]) -> Option<(usize, u64)> {
    if data.len() <= CHUNK_HEADER_BYTES || &data[..8] != b"DTSHDHDR" {
        return None;
    }

    let mut offset = 0usize;
    while offset + CHUNK_HEADER_BYTES + 4 <= data.len() {
        let chunk_size = read_be64(&data[offset + 8..]);
        if &data[offset..offset + 8] == b"STRMDATA" {
            return Some((offset + CHUNK_HEADER_BYTES, chunk_size));
        }
        offset = offset
            .checked_add(CHUNK_HEADER_BYTES)?
            .checked_add(usize::try_from(chunk_size).ok()?)?;
    }

    None
}

/// Scores a stream head: maximum minus three when a syncword is found and
/// a single frame parses, zero otherwise.
pub fn probe(data: &[u8]) -> u8 {
    let mut offset = locate_strmdata(data).map_or(0, |(payload, _)| payload);
    let mut parser = Parser::default();

    while offset + 4 < data.len() {
        if is_syncword(read_be32(&data[offset..])) && parser.parse(&data[offset..]).is_ok() {
            return PROBE_SCORE_MAX - 3;
        }
        offset += 1;
    }

    0
}

/// One-shot demuxer over a seekable byte source.
///
/// Opening locates the payload region, parses the first sync frame to
/// obtain the sample entry descriptor, and rewinds to the payload start.
/// Packets of up to [`MAX_FRAME_SIZE`] raw bytes are then streamed until
/// the payload region is exhausted; downstream frame alignment is the
/// consumer's codec parser's job.
pub struct Demuxer<R: Read + Seek> {
    reader: R,
    data_end: u64,
    pos: u64,
    descriptor: DescriptorInfo,
    first_frame: FrameInfo,
}

impl<R: Read + Seek> Demuxer<R> {
    pub fn open(mut reader: R) -> Result<Self, DemuxError> {
        let mut buf = vec![0u8; HEADER_BUFFER_SIZE];
        let mut buf_bytes = 0;
        while buf_bytes < buf.len() {
            let read = reader.read(&mut buf[buf_bytes..])?;
            if read == 0 {
                break;
            }
            buf_bytes += read;
        }
        let head = &buf[..buf_bytes];

        let (payload_start, data_end) = match locate_strmdata(head) {
            Some((offset, size)) => {
                debug!("STRMDATA payload: {size} bytes at offset {offset}");
                (offset, offset as u64 + size)
            }
            None => (0, reader.seek(SeekFrom::End(0))?),
        };

        let data_start =
            find_syncword(head, payload_start).ok_or(DemuxError::SyncNotFound)?;

        let mut parser = Parser::default();
        let (first_frame, descriptor) = parser.parse_with_descriptor(&head[data_start..])?;
        let descriptor = descriptor.ok_or(DemuxError::MissingDescriptor)?;

        reader.seek(SeekFrom::Start(data_start as u64))?;

        Ok(Self {
            reader,
            data_end,
            pos: data_start as u64,
            descriptor,
            first_frame,
        })
    }

    /// Sample entry descriptor parsed from the first sync frame.
    pub fn descriptor(&self) -> &DescriptorInfo {
        &self.descriptor
    }

    /// Frame info of the first parsed frame.
    pub fn first_frame(&self) -> &FrameInfo {
        &self.first_frame
    }

    /// Bytes of payload remaining to be read.
    pub fn payload_bytes(&self) -> u64 {
        self.data_end.saturating_sub(self.pos)
    }

    /// Reads the next raw packet, up to [`MAX_FRAME_SIZE`] bytes. Returns
    /// `None` once the payload region is exhausted.
    pub fn next_packet(&mut self) -> Result<Option<Vec<u8>>, DemuxError> {
        let size = self.payload_bytes().min(MAX_FRAME_SIZE as u64) as usize;
        if size == 0 {
            return Ok(None);
        }

        let mut packet = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            let read = self.reader.read(&mut packet[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        if filled == 0 {
            return Ok(None);
        }

        packet.truncate(filled);
        self.pos += filled as u64;
        Ok(Some(packet))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::process::parse::testframe::{nonsync_frame, sync_frame};

    fn container(payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"DTSHDHDR");
        data.extend_from_slice(&8u64.to_be_bytes());
        data.extend_from_slice(&[0u8; 8]); // header chunk payload
        data.extend_from_slice(b"STRMDATA");
        data.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn locates_strmdata_payload() {
        let data = container(&[0xAA; 24]);
        // DTSHDHDR chunk of 8 bytes, then the payload chunk header.
        assert_eq!(locate_strmdata(&data), Some((24 + 16, 24)));

        assert_eq!(locate_strmdata(b"RIFFdata not a container"), None);
        assert_eq!(locate_strmdata(&data[..10]), None);
    }

    #[test]
    fn probe_scores_parseable_streams() {
        let (sync, _) = sync_frame(1, 4);

        let mut raw = vec![0x00u8; 9]; // leading garbage
        raw.extend_from_slice(&sync);
        raw.extend_from_slice(&[0u8; 8]);
        assert_eq!(probe(&raw), PROBE_SCORE_MAX - 3);

        let wrapped = container(&raw);
        assert_eq!(probe(&wrapped), PROBE_SCORE_MAX - 3);

        assert_eq!(probe(&[0x55u8; 256]), 0);
    }

    #[test]
    fn demuxes_container_payload() {
        let (sync, _) = sync_frame(1, 4);
        let (nonsync, _) = nonsync_frame(5);

        let mut payload = Vec::new();
        payload.extend_from_slice(&sync);
        payload.extend_from_slice(&nonsync);

        let data = container(&payload);
        let mut demuxer = Demuxer::open(Cursor::new(data)).unwrap();

        assert_eq!(demuxer.descriptor().coding_name, "dtsx");
        assert_eq!(demuxer.descriptor().channel_count, 1);
        assert_eq!(demuxer.first_frame().sample_rate, 48000);
        assert_eq!(demuxer.payload_bytes(), payload.len() as u64);

        let packet = demuxer.next_packet().unwrap().unwrap();
        assert_eq!(packet, payload);
        assert!(demuxer.next_packet().unwrap().is_none());
    }

    #[test]
    fn demuxes_raw_streams_to_end_of_input() {
        let (sync, _) = sync_frame(1, 4);
        let mut data = sync.clone();
        data.extend_from_slice(&nonsync_frame(5).0);

        let mut demuxer = Demuxer::open(Cursor::new(data.clone())).unwrap();
        assert_eq!(demuxer.payload_bytes(), data.len() as u64);

        let packet = demuxer.next_packet().unwrap().unwrap();
        assert_eq!(packet, data);
    }

    #[test]
    fn open_rejects_streams_without_sync() {
        let data = vec![0u8; 64];
        assert!(matches!(
            Demuxer::open(Cursor::new(data)),
            Err(DemuxError::SyncNotFound)
        ));
    }
}
