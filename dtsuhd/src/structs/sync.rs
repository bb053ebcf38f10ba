//! Syncwords and FTOC stream parameters.
//!
//! Every frame opens with one of two 32-bit syncwords. Sync frames carry
//! the full stream configuration; non-sync frames reuse the configuration
//! acquired from the last sync frame.

use crate::process::parse::ParserState;
use crate::utils::bitstream::BsSliceReader;
use crate::utils::errors::InvalidFrameError;

/// Syncword opening a sync frame (full stream configuration).
pub const SYNCWORD_SYNC: u32 = 0x4041_1BF2;

/// Syncword opening a non-sync frame.
pub const SYNCWORD_NONSYNC: u32 = 0x71C4_42E8;

/// Upper bound on the size of a single frame in bytes.
pub const MAX_FRAME_SIZE: usize = 0x1000;

const BASE_DURATION_TABLE: [u32; 4] = [512, 480, 384, 0];
const CLOCK_RATE_TABLE: [u32; 4] = [32000, 44100, 48000, 0];

/// True for either frame syncword.
#[inline(always)]
pub fn is_syncword(word: u32) -> bool {
    word == SYNCWORD_SYNC || word == SYNCWORD_NONSYNC
}

pub(crate) fn read_be32(data: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&data[..4]);
    u32::from_be_bytes(word)
}

pub(crate) fn read_be64(data: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&data[..8]);
    u64::from_be_bytes(word)
}

/// Finds the next byte offset at or after `start` holding a syncword.
pub fn find_syncword(data: &[u8], start: usize) -> Option<usize> {
    let mut offset = start;
    while offset + 4 < data.len() {
        if is_syncword(read_be32(&data[offset..])) {
            return Some(offset);
        }
        offset += 1;
    }
    None
}

/// Version field: a 1-bit selector picks a 3- or 6-bit width, and the
/// value is carried twice at that width.
fn decode_version(reader: &mut BsSliceReader) -> u32 {
    let bits = if reader.get() { 3 } else { 6 };
    let version = reader.get_n(bits) + 2;
    reader.skip_n(bits);
    version
}

/// Stream parameters at the head of the FTOC. Only sync frames mutate the
/// configuration, but the FTOC CRC is still validated on every frame
/// unless the stream runs in full-channel-mix mode.
pub(crate) fn read_stream_params(
    state: &mut ParserState,
    reader: &mut BsSliceReader,
) -> Result<(), InvalidFrameError> {
    if state.is_sync_frame {
        state.full_channel_mix_flag = reader.get();
    }

    let has_ftoc_crc = !state.full_channel_mix_flag || state.is_sync_frame;
    if has_ftoc_crc && !state.crc_frame.validate(reader.data(), 0, state.ftoc_bytes) {
        return Err(InvalidFrameError::FtocCrcMismatch {
            bytes: state.ftoc_bytes,
        });
    }

    if state.is_sync_frame {
        if state.full_channel_mix_flag {
            state.major_version = 2;
        } else {
            state.major_version = decode_version(reader);
        }

        let base_duration = BASE_DURATION_TABLE[reader.get_n(2) as usize];
        state.frame_duration_code = reader.get_n(3) as u8;
        state.frame_duration = base_duration * (state.frame_duration_code as u32 + 1);
        state.clock_rate = CLOCK_RATE_TABLE[reader.get_n(2) as usize];
        if state.frame_duration == 0 {
            return Err(InvalidFrameError::InvalidBaseDuration);
        }
        if state.clock_rate == 0 {
            return Err(InvalidFrameError::InvalidClockRate);
        }

        if reader.get() {
            reader.skip_n(36); // timestamp
        }
        state.sample_rate_mod = reader.get_n(2) as u8;
        state.sample_rate = state.clock_rate << state.sample_rate_mod;

        if state.full_channel_mix_flag {
            state.interactive_obj_limits_present = false;
        } else {
            reader.skip_n(1); // reserved
            state.interactive_obj_limits_present = reader.get();
        }
    }

    Ok(())
}

#[test]
fn syncword_scan() {
    let mut data = vec![0u8; 7];
    data.extend_from_slice(&SYNCWORD_SYNC.to_be_bytes());
    data.extend_from_slice(&[0, 0, 0, 0]);

    assert_eq!(find_syncword(&data, 0), Some(7));
    assert_eq!(find_syncword(&data, 8), None);
    assert!(is_syncword(SYNCWORD_NONSYNC));
    assert!(!is_syncword(0x4041_1BF3));
}
