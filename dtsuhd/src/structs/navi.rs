//! Chunk table and audio-chunk navigation.
//!
//! The FTOC tail carries a descriptor array for the metadata chunks that
//! follow it, then a navigation table mapping stable audio-chunk indices
//! to per-frame byte sizes and optional ids. Navigation slots survive
//! across non-sync frames so an absent chunk keeps its index.

use crate::process::parse::ParserState;
use crate::utils::bitstream::BsSliceReader;

/// Descriptor for one metadata chunk following the FTOC.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkDesc {
    pub bytes: usize,
    pub crc_flag: bool,
}

/// One slot of the audio-chunk navigation table.
#[derive(Debug, Clone, Copy)]
pub struct NaviEntry {
    pub bytes: usize,
    pub id: u32,
    pub index: u32,
    pub present: bool,
}

const INDEX_WIDTHS: [u32; 4] = [2, 4, 6, 8];
const CHUNK_SIZE_WIDTHS: [u32; 4] = [6, 9, 12, 15];
const AUDIO_CHUNK_SIZE_WIDTHS: [u32; 4] = [9, 11, 13, 16];

/// Id marking a navigation slot whose chunk id was never transmitted.
const NAVI_ID_UNSET: u32 = 256;

pub(crate) fn read_chunk_navi(state: &mut ParserState, reader: &mut BsSliceReader) {
    state.chunk_bytes = 0;

    let chunk_count = if state.full_channel_mix_flag {
        state.is_sync_frame as usize
    } else {
        reader.get_var(INDEX_WIDTHS) as usize
    };

    state.chunks.clear();
    for _ in 0..chunk_count {
        let bytes = reader.get_var(CHUNK_SIZE_WIDTHS) as usize;
        state.chunk_bytes += bytes;
        let crc_flag = if state.full_channel_mix_flag {
            false
        } else {
            reader.get()
        };
        state.chunks.push(ChunkDesc { bytes, crc_flag });
    }

    let audio_chunks = if state.full_channel_mix_flag {
        1
    } else {
        reader.get_var(INDEX_WIDTHS)
    };

    if state.is_sync_frame {
        state.navi.clear();
    } else {
        for entry in &mut state.navi {
            entry.present = false;
        }
    }

    for _ in 0..audio_chunks {
        let index = if state.full_channel_mix_flag {
            0
        } else {
            reader.get_var(INDEX_WIDTHS)
        };

        let slot = navi_find_index(state, index);

        let id_present = if state.is_sync_frame {
            true
        } else if state.full_channel_mix_flag {
            false
        } else {
            reader.get()
        };
        if id_present {
            state.navi[slot].id = reader.get_var(INDEX_WIDTHS);
        }

        let bytes = reader.get_var(AUDIO_CHUNK_SIZE_WIDTHS) as usize;
        state.chunk_bytes += bytes;
        state.navi[slot].bytes = bytes;
    }

    // Purge: absent slots drop their payload but keep their index.
    for entry in &mut state.navi {
        if !entry.present {
            entry.bytes = 0;
        }
    }
}

/// Locates `index` in the navigation table, reusing the lowest exhausted
/// slot or appending when it is not yet mapped.
fn navi_find_index(state: &mut ParserState, index: u32) -> usize {
    let mut avail = state.navi.len();

    for (slot, entry) in state.navi.iter_mut().enumerate() {
        if entry.index == index {
            entry.present = true;
            return slot;
        }
        if !entry.present && entry.bytes == 0 && avail > slot {
            avail = slot;
        }
    }

    if avail >= state.navi.len() {
        state.navi.push(NaviEntry {
            bytes: 0,
            id: NAVI_ID_UNSET,
            index,
            present: true,
        });
        return state.navi.len() - 1;
    }

    state.navi[avail] = NaviEntry {
        bytes: 0,
        id: NAVI_ID_UNSET,
        index,
        present: true,
    };
    avail
}

#[test]
fn navi_slots_are_reused_by_index() {
    let mut state = ParserState::default();

    let first = navi_find_index(&mut state, 4);
    let second = navi_find_index(&mut state, 7);
    assert_eq!((first, second), (0, 1));
    assert_eq!(navi_find_index(&mut state, 4), 0);

    // An absent, emptied slot is the first candidate for a new index.
    state.navi[0].present = false;
    state.navi[0].bytes = 0;
    let reused = navi_find_index(&mut state, 9);
    assert_eq!(reused, 0);
    assert_eq!(state.navi[0].index, 9);
    assert_eq!(state.navi[0].id, 256);
    assert!(state.navi[0].present);
}
