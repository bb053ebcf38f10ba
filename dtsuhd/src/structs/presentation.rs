//! Audio presentation parameters.
//!
//! A frame carries up to 32 selectable presentations. Sync frames define
//! the presentation count, selectability, and the inter-presentation
//! dependency masks; non-sync frames reuse them and only refresh the
//! explicit object lists.

use crate::process::parse::ParserState;
use crate::utils::bitstream::BsSliceReader;

/// Per-presentation selection state, retained across frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct Presentation {
    /// Dependency mask over lower-indexed presentations.
    pub mask: u64,
    pub selectable: bool,
}

const PRES_COUNT_WIDTHS: [u32; 4] = [0, 2, 4, 5];
const OBJECT_LIST_SIZE_WIDTHS: [u32; 4] = [4, 8, 16, 32];

pub(crate) fn read_presentations(state: &mut ParserState, reader: &mut BsSliceReader) {
    if state.is_sync_frame {
        state.num_audio_pres = if state.full_channel_mix_flag {
            1
        } else {
            reader.get_var(PRES_COUNT_WIDTHS) as usize + 1
        };
        for pres in &mut state.audio[..state.num_audio_pres] {
            *pres = Presentation::default();
        }
    }

    for index in 0..state.num_audio_pres {
        if state.is_sync_frame {
            state.audio[index].selectable = state.full_channel_mix_flag || reader.get();
        }

        if state.audio[index].selectable {
            if state.is_sync_frame {
                // The dependency mask is as wide as the presentation index,
                // so presentation 0 reads no mask at all.
                let mut read_mask = if index > 0 {
                    reader.get_n64(index as u32)
                } else {
                    0
                };
                state.audio[index].mask = 0;
                let mut bit = 0;
                while read_mask != 0 {
                    if read_mask & 1 != 0 {
                        state.audio[index].mask |= (reader.get() as u64) << bit;
                    }
                    bit += 1;
                    read_mask >>= 1;
                }
            }

            read_explicit_object_lists(state, reader, state.audio[index].mask, index);
        } else {
            state.audio[index].mask = 0;
        }
    }
}

fn read_explicit_object_lists(
    state: &ParserState,
    reader: &mut BsSliceReader,
    mask: u64,
    index: usize,
) {
    for bit in 0..index {
        if (mask >> bit) & 1 != 0 && (state.is_sync_frame || reader.get()) {
            reader.get_var(OBJECT_LIST_SIZE_WIDTHS);
        }
    }
}
