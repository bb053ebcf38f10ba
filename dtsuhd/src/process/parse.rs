use log::trace;

use crate::structs::descriptor::DescriptorInfo;
use crate::structs::md01::{self, Md01};
use crate::structs::navi::{self, ChunkDesc, NaviEntry};
use crate::structs::presentation::{self, Presentation};
use crate::structs::sync::{self, SYNCWORD_NONSYNC, SYNCWORD_SYNC};
use crate::utils::bitstream::BsSliceReader;
use crate::utils::crc::Crc16;
use crate::utils::errors::FrameError;

const FTOC_SIZE_WIDTHS: [u32; 4] = [5, 8, 10, 12];

/// Parses DTS-UHD frames and maintains the cross-frame stream state.
///
/// One parser serves exactly one audio stream; frames must be supplied in
/// stream order, each starting at the first byte of the buffer. A sync
/// frame must precede any non-sync frame.
#[derive(Debug, Default)]
pub struct Parser {
    state: ParserState,
}

impl Parser {
    /// Parses a single frame from the head of `data`.
    pub fn parse(&mut self, data: &[u8]) -> Result<FrameInfo, FrameError> {
        self.parse_inner(data, false).map(|(info, _)| info)
    }

    /// Parses a single frame and, on sync frames, additionally walks the
    /// metadata chunks to produce the sample entry descriptor.
    pub fn parse_with_descriptor(
        &mut self,
        data: &[u8],
    ) -> Result<(FrameInfo, Option<DescriptorInfo>), FrameError> {
        self.parse_inner(data, true)
    }

    /// Cross-frame state accumulated so far.
    pub fn state(&self) -> &ParserState {
        &self.state
    }

    fn parse_inner(
        &mut self,
        data: &[u8],
        want_descriptor: bool,
    ) -> Result<(FrameInfo, Option<DescriptorInfo>), FrameError> {
        let state = &mut self.state;

        if data.len() < 4 {
            return Err(FrameError::Incomplete);
        }

        let mut reader = BsSliceReader::from_slice(data);
        let syncword = reader.get_n(32);
        state.is_sync_frame = syncword == SYNCWORD_SYNC;
        state.saw_sync |= state.is_sync_frame;
        if !state.saw_sync || (!state.is_sync_frame && syncword != SYNCWORD_NONSYNC) {
            return Err(FrameError::NoSync);
        }

        state.ftoc_bytes = reader.get_var(FTOC_SIZE_WIDTHS) as usize + 1;
        if state.ftoc_bytes < 5 || state.ftoc_bytes >= data.len() {
            return Err(FrameError::Incomplete);
        }

        sync::read_stream_params(state, &mut reader)?;
        presentation::read_presentations(state, &mut reader);
        navi::read_chunk_navi(state, &mut reader);

        state.frame_bytes = state.ftoc_bytes + state.chunk_bytes;
        if state.frame_bytes > data.len() {
            return Err(FrameError::Incomplete);
        }

        let mut descriptor = None;
        if want_descriptor && state.is_sync_frame {
            // Step past the FTOC CRC to the first chunk.
            reader.align_to(state.ftoc_bytes * 8);
            md01::read_chunks(state, &mut reader)?;
            descriptor = Some(DescriptorInfo::from_state(state));
        }

        // The audio frame duration may be a fraction of the metadata frame
        // duration, signalled by audio chunk ids 3 and 4.
        let mut fraction = 1u64;
        for entry in &state.navi {
            if entry.present {
                if entry.id == 3 {
                    fraction = 2;
                } else if entry.id == 4 {
                    fraction = 4;
                }
            }
        }

        let sample_count = (state.frame_duration as u64 * state.sample_rate as u64
            / (state.clock_rate as u64 * fraction)) as u32;

        let info = FrameInfo {
            sync: state.is_sync_frame,
            frame_bytes: state.frame_bytes,
            sample_rate: state.sample_rate,
            sample_count,
            duration: sample_count as f64 / state.sample_rate as f64,
        };

        trace!(
            "{} frame: {} bytes, {} samples @ {} Hz",
            if info.sync { "sync" } else { "non-sync" },
            info.frame_bytes,
            info.sample_count,
            info.sample_rate,
        );

        Ok((info, descriptor))
    }
}

/// Timing and size information for one parsed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// True for sync frames.
    pub sync: bool,
    /// Size of the entire frame in bytes.
    pub frame_bytes: usize,
    /// Sample rate of the frame in Hz.
    pub sample_rate: u32,
    /// Number of samples spanned by the frame.
    pub sample_count: u32,
    /// Duration of the frame in seconds.
    pub duration: f64,
}

/// Cross-frame parser state for a single DTS-UHD stream.
///
/// Created once per stream and mutated only by frame parsing. The
/// growable tables keep their high-water capacity across frames; the
/// metadata chunk states persist until the stream ends.
#[derive(Debug)]
pub struct ParserState {
    /// True once any sync frame has been recognized.
    pub saw_sync: bool,
    pub is_sync_frame: bool,
    pub full_channel_mix_flag: bool,
    pub interactive_obj_limits_present: bool,

    /// Decoded major version, at least 2.
    pub major_version: u32,
    pub frame_duration: u32,
    pub frame_duration_code: u8,
    pub clock_rate: u32,
    pub sample_rate: u32,
    pub sample_rate_mod: u8,

    pub ftoc_bytes: usize,
    pub chunk_bytes: usize,
    pub frame_bytes: usize,

    pub num_audio_pres: usize,
    pub audio: [Presentation; 256],

    /// Metadata chunk descriptors for the current frame.
    pub chunks: Vec<ChunkDesc>,
    /// Audio-chunk navigation table, surviving across frames.
    pub navi: Vec<NaviEntry>,
    /// Metadata chunk states keyed by chunk id.
    pub md01: Vec<Md01>,

    pub crc_frame: Crc16,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            saw_sync: false,
            is_sync_frame: false,
            full_channel_mix_flag: false,
            interactive_obj_limits_present: false,

            major_version: 0,
            frame_duration: 0,
            frame_duration_code: 0,
            clock_rate: 0,
            sample_rate: 0,
            sample_rate_mod: 0,

            ftoc_bytes: 0,
            chunk_bytes: 0,
            frame_bytes: 0,

            num_audio_pres: 0,
            audio: [Presentation::default(); 256],

            chunks: Vec::new(),
            navi: Vec::new(),
            md01: Vec::new(),

            crc_frame: Crc16::default(),
        }
    }
}

/// Synthesized full-channel-mix frames for exercising the parser.
#[cfg(test)]
pub(crate) mod testframe {
    use super::FTOC_SIZE_WIDTHS;
    use crate::structs::sync::{SYNCWORD_NONSYNC, SYNCWORD_SYNC};
    use crate::utils::bitstream::BitSink;
    use crate::utils::crc::Crc16;

    const MD_CHUNK_BYTES: usize = 3;

    /// One MD01 chunk declaring a mono (front-center) default object.
    fn md01_chunk() -> Vec<u8> {
        let mut sink = BitSink::default();
        sink.put(8, 1); // chunk id
        sink.put_var([0, 2, 4, 4], 0); // presentation index
        sink.put(4, 0); // no scaling data
        sink.put(1, 0); // no multi-frame static metadata
        sink.put(3, 0); // representation: channel-mask based
        sink.put(4, 0); // channel mask index 0 -> mono
        sink.pad_to(MD_CHUNK_BYTES * 8);
        sink.into_bytes()
    }

    fn assemble(syncword: u32, body: BitSink, with_crc: bool, tail: &[u8]) -> (Vec<u8>, usize) {
        let crc_bytes = if with_crc { 2 } else { 0 };

        // The FTOC size field encodes its own width; iterate to the fixed
        // point before assembling.
        let mut ftoc_bytes = 5usize;
        loop {
            let mut head = BitSink::default();
            head.put(32, syncword as u64);
            head.put_var(FTOC_SIZE_WIDTHS, (ftoc_bytes - 1) as u64);
            let needed = ((head.len() + body.len()).div_ceil(8) + crc_bytes).max(5);
            if needed == ftoc_bytes {
                break;
            }
            ftoc_bytes = needed;
        }

        let mut frame = BitSink::default();
        frame.put(32, syncword as u64);
        frame.put_var(FTOC_SIZE_WIDTHS, (ftoc_bytes - 1) as u64);
        frame.extend(body);
        frame.pad_to((ftoc_bytes - crc_bytes) * 8);
        let mut bytes = frame.into_bytes();
        if with_crc {
            let crc = Crc16::default().checksum(&bytes);
            bytes.extend_from_slice(&crc.to_be_bytes());
        }
        bytes.extend_from_slice(tail);
        (bytes, ftoc_bytes)
    }

    /// Full-channel-mix sync frame with one metadata chunk and one audio
    /// chunk of `audio_bytes` carrying `audio_chunk_id`. Returns the frame
    /// and its FTOC size.
    pub(crate) fn sync_frame(audio_chunk_id: u64, audio_bytes: usize) -> (Vec<u8>, usize) {
        let mut body = BitSink::default();
        body.put(1, 1); // full channel mix
        body.put(2, 0); // base duration 512
        body.put(3, 0); // duration multiplier code
        body.put(2, 2); // clock rate 48000
        body.put(1, 0); // no timestamp
        body.put(2, 0); // sample rate modifier
        body.put_var([6, 9, 12, 15], MD_CHUNK_BYTES as u64);
        body.put_var([2, 4, 6, 8], audio_chunk_id);
        body.put_var([9, 11, 13, 16], audio_bytes as u64);

        let mut tail = md01_chunk();
        tail.extend((0..audio_bytes).map(|i| 0x30u8.wrapping_add(i as u8)));
        assemble(SYNCWORD_SYNC, body, true, &tail)
    }

    /// Full-channel-mix non-sync frame with one audio chunk.
    pub(crate) fn nonsync_frame(audio_bytes: usize) -> (Vec<u8>, usize) {
        let mut body = BitSink::default();
        body.put_var([9, 11, 13, 16], audio_bytes as u64);

        let tail: Vec<u8> = (0..audio_bytes).map(|i| 0x60u8.wrapping_add(i as u8)).collect();
        assemble(SYNCWORD_NONSYNC, body, false, &tail)
    }
}

#[cfg(test)]
mod tests {
    use super::testframe::{nonsync_frame, sync_frame};
    use super::*;
    use crate::structs::descriptor::host;
    use crate::structs::md01::RepType;
    use crate::utils::errors::InvalidFrameError;

    #[test]
    fn minimal_sync_frame_with_descriptor() {
        let (frame, ftoc_bytes) = sync_frame(1, 4);
        let mut parser = Parser::default();

        let (info, descriptor) = parser.parse_with_descriptor(&frame).unwrap();
        assert!(info.sync);
        assert_eq!(info.frame_bytes, frame.len());
        assert_eq!(info.frame_bytes, ftoc_bytes + 3 + 4);
        assert_eq!(info.sample_rate, 48000);
        assert_eq!(info.sample_count, 512);
        assert!((info.duration - 512.0 / 48000.0).abs() < 1e-9);

        let descriptor = descriptor.unwrap();
        assert_eq!(descriptor.coding_name, "dtsx");
        assert_eq!(descriptor.channel_count, 1);
        assert_eq!(descriptor.channel_mask, 0x1);
        assert_eq!(descriptor.host_channel_mask, host::FRONT_CENTER);
        assert_eq!(descriptor.num_pres_code, 0);
        assert_eq!(descriptor.decoder_profile_code, 0);
        assert_eq!(descriptor.max_payload_code, 0);
        assert_eq!(descriptor.base_sample_freq_code, 1);
        assert_eq!(descriptor.rep_type, RepType::ChMaskBased);
        assert_eq!(descriptor.sample_size, 16);
    }

    #[test]
    fn sync_then_nonsync_sequence() {
        let (sync, _) = sync_frame(1, 4);
        let (nonsync, nonsync_ftoc) = nonsync_frame(5);
        let mut parser = Parser::default();

        let first = parser.parse(&sync).unwrap();
        assert!(first.sync);

        for _ in 0..3 {
            let info = parser.parse(&nonsync).unwrap();
            assert!(!info.sync);
            assert_eq!(info.sample_rate, first.sample_rate);
            assert_eq!(info.sample_count, first.sample_count);
            assert_eq!(info.frame_bytes, nonsync_ftoc + 5);
        }
        assert!(parser.state().saw_sync);
    }

    #[test]
    fn nonsync_before_sync_is_rejected() {
        let (nonsync, _) = nonsync_frame(5);
        let mut parser = Parser::default();
        assert_eq!(parser.parse(&nonsync), Err(FrameError::NoSync));

        // Unrecognized words are equally resyncable.
        let garbage = [0xDEu8, 0xAD, 0xBE, 0xEF, 0x00, 0x00];
        assert_eq!(parser.parse(&garbage), Err(FrameError::NoSync));
    }

    #[test]
    fn truncated_inputs_are_incomplete() {
        let (frame, ftoc_bytes) = sync_frame(1, 4);

        assert_eq!(
            Parser::default().parse(&frame[..3]),
            Err(FrameError::Incomplete)
        );
        assert_eq!(
            Parser::default().parse(&frame[..ftoc_bytes]),
            Err(FrameError::Incomplete)
        );
        assert_eq!(
            Parser::default().parse(&frame[..frame.len() - 1]),
            Err(FrameError::Incomplete)
        );
        assert!(Parser::default().parse(&frame).is_ok());
    }

    #[test]
    fn corrupted_ftoc_crc_is_invalid() {
        let (mut frame, ftoc_bytes) = sync_frame(1, 4);
        frame[ftoc_bytes - 1] ^= 0x40;

        let result = Parser::default().parse(&frame);
        assert_eq!(
            result,
            Err(FrameError::Invalid(InvalidFrameError::FtocCrcMismatch {
                bytes: ftoc_bytes
            }))
        );
    }

    #[test]
    fn audio_chunk_id_selects_duration_fraction() {
        let (whole, _) = sync_frame(1, 4);
        let (half, _) = sync_frame(3, 4);
        let (quarter, _) = sync_frame(4, 4);

        assert_eq!(Parser::default().parse(&whole).unwrap().sample_count, 512);
        assert_eq!(Parser::default().parse(&half).unwrap().sample_count, 256);
        assert_eq!(Parser::default().parse(&quarter).unwrap().sample_count, 128);
    }

    #[test]
    fn frame_bytes_matches_table_sums() {
        let (frame, _) = sync_frame(1, 7);
        let mut parser = Parser::default();
        let info = parser.parse(&frame).unwrap();

        let state = parser.state();
        let chunk_sum: usize = state.chunks.iter().map(|c| c.bytes).sum();
        let navi_sum: usize = state
            .navi
            .iter()
            .filter(|n| n.present)
            .map(|n| n.bytes)
            .sum();
        assert_eq!(info.frame_bytes, state.ftoc_bytes + chunk_sum + navi_sum);
        assert_eq!(state.sample_rate, state.clock_rate << state.sample_rate_mod);
    }

    #[test]
    fn descriptor_only_on_sync_frames() {
        let (sync, _) = sync_frame(1, 4);
        let (nonsync, _) = nonsync_frame(5);
        let mut parser = Parser::default();

        let (_, descriptor) = parser.parse_with_descriptor(&sync).unwrap();
        assert!(descriptor.is_some());

        let (info, descriptor) = parser.parse_with_descriptor(&nonsync).unwrap();
        assert!(!info.sync);
        assert!(descriptor.is_none());
    }
}
