//! Metadata chunks and audio objects.
//!
//! Metadata chunks sit between the FTOC and the audio chunks. Only chunk
//! id 1 (MD01) is defined; it carries an object list, optional scaling and
//! multi-frame static metadata, and per-object representation and
//! channel-activity descriptors. Unknown chunk ids are skipped by
//! realigning to the chunk boundary.

use crate::process::parse::ParserState;
use crate::utils::bitstream::BsSliceReader;
use crate::utils::errors::InvalidFrameError;

/// Distinguished object slot used when no explicit object id is coded.
pub const OBJECT_ID_DEFAULT: u32 = 256;

/// Object ids at or above this value address object groups, which bypass
/// render-suitability testing.
const OBJECT_GROUP_ID_START: u32 = 224;

/// Object representation type (3-bit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepType {
    #[default]
    ChMaskBased = 0,
    Mtrx2dChMaskBased = 1,
    Mtrx3dChMaskBased = 2,
    Binaural = 3,
    Ambisonic = 4,
    AudioTracks = 5,
    Object3dSingleSrcPerWf = 6,
    MonoObject3dSingleSrcPerWf = 7,
}

impl RepType {
    pub(crate) fn from_code(code: u32) -> Self {
        match code & 7 {
            0 => RepType::ChMaskBased,
            1 => RepType::Mtrx2dChMaskBased,
            2 => RepType::Mtrx3dChMaskBased,
            3 => RepType::Binaural,
            4 => RepType::Ambisonic,
            5 => RepType::AudioTracks,
            6 => RepType::Object3dSingleSrcPerWf,
            _ => RepType::MonoObject3dSingleSrcPerWf,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    fn is_ch_mask_based(self) -> bool {
        matches!(
            self,
            RepType::Binaural
                | RepType::ChMaskBased
                | RepType::Mtrx2dChMaskBased
                | RepType::Mtrx3dChMaskBased
        )
    }

    fn is_3d_metadata(self) -> bool {
        matches!(
            self,
            RepType::Object3dSingleSrcPerWf | RepType::MonoObject3dSingleSrcPerWf
        )
    }
}

/// Per-object state within an MD01 chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdObject {
    /// Seen since the object table was last reset.
    pub started: bool,
    pub pres_index: usize,
    pub rep_type: RepType,
    pub ch_activity_mask: u32,
}

/// State of one metadata chunk, keyed by chunk id and retained across
/// frames.
#[derive(Debug)]
pub struct Md01 {
    pub chunk_id: u32,
    pub object_list: Vec<u32>,
    /// One slot per possible object id; index 256 is the default slot.
    pub object: Box<[MdObject; 257]>,
    pub packets_acquired: usize,
    pub static_md_extracted: bool,
    pub static_md_packets: usize,
    pub static_md_packet_size: usize,
    pub static_md_update_flag: bool,
    /// Accumulates static metadata spread across multiple frames.
    pub buf: Vec<u8>,
    /// Bit cursor into `buf`, used instead of the frame cursor whenever
    /// `buf` is non-empty.
    gb_pos: usize,
}

impl Md01 {
    fn new(chunk_id: u32) -> Self {
        Self {
            chunk_id,
            object_list: Vec::new(),
            object: Box::new([MdObject::default(); 257]),
            packets_acquired: 0,
            static_md_extracted: false,
            static_md_packets: 0,
            static_md_packet_size: 0,
            static_md_update_flag: false,
            buf: Vec::new(),
            gb_pos: 0,
        }
    }

    /// Reads from the static-metadata buffer when present, falling back to
    /// the frame cursor.
    fn get_md(&mut self, reader: &mut BsSliceReader, n: u32) -> u32 {
        if self.buf.is_empty() {
            return reader.get_n(n);
        }
        let mut gb = BsSliceReader::from_slice(&self.buf);
        gb.align_to(self.gb_pos);
        let value = gb.get_n(n);
        self.gb_pos = gb.position();
        value
    }

    fn skip_md(&mut self, reader: &mut BsSliceReader, n: u32) {
        if self.buf.is_empty() {
            reader.skip_n(n);
        } else {
            self.gb_pos += n as usize;
        }
    }
}

const PRES_INDEX_WIDTHS: [u32; 4] = [0, 2, 4, 4];
const OBJECT_LIST_COUNT_WIDTHS: [u32; 4] = [3, 4, 6, 8];
const PACKET_COUNT_WIDTHS: [u32; 4] = [0, 6, 9, 12];
const PACKET_SIZE_WIDTHS: [u32; 4] = [5, 7, 9, 11];
const REJECTED_RENDER_WIDTHS: [u32; 4] = [8, 10, 12, 14];
const OBJECT_MD_WIDTHS_A: [u32; 4] = [1, 4, 4, 8];
const OBJECT_MD_WIDTHS_B: [u32; 4] = [3, 3, 4, 8];

/// Channel activity masks selected by a 4-bit index; indices 14 and 15
/// switch to explicit 16- and 32-bit masks instead.
const CH_ACTIVITY_TABLE: [u32; 14] = [
    0x000001, 0x000002, 0x000006, 0x00000F, 0x00001F, 0x00084B, 0x00002F, 0x00802F, 0x00486B,
    0x00886B, 0x03FBFB, 0x000003, 0x000007, 0x000843,
];

/// Walks the metadata chunks described by the FTOC chunk table, parsing
/// MD01 chunks and skipping everything else. The cursor always lands on
/// the chunk boundary afterwards, whatever the chunk id.
pub(crate) fn read_chunks(
    state: &mut ParserState,
    reader: &mut BsSliceReader,
) -> Result<(), InvalidFrameError> {
    for index in 0..state.chunks.len() {
        let chunk = state.chunks[index];
        let bit_next = reader.position() + chunk.bytes * 8;

        if chunk.crc_flag
            && !state
                .crc_frame
                .validate(reader.data(), reader.position(), chunk.bytes)
        {
            return Err(InvalidFrameError::ChunkCrcMismatch {
                index,
                bytes: chunk.bytes,
            });
        }

        let id = reader.get_n(8);
        if id == 1 {
            let pres_index = reader.get_var(PRES_INDEX_WIDTHS);
            if pres_index > 255 {
                return Err(InvalidFrameError::PresIndexOutOfRange(pres_index));
            }

            let md01_index = find_or_append_md01(state, id);
            read_md_chunk_list(state, reader, md01_index);
            read_md01(state, reader, md01_index, pres_index as usize);
        }

        reader.align_to(bit_next);
    }

    Ok(())
}

fn find_or_append_md01(state: &mut ParserState, chunk_id: u32) -> usize {
    if let Some(index) = state.md01.iter().position(|m| m.chunk_id == chunk_id) {
        return index;
    }
    state.md01.push(Md01::new(chunk_id));
    state.md01.len() - 1
}

fn read_md_chunk_list(state: &mut ParserState, reader: &mut BsSliceReader, md01_index: usize) {
    let full_channel_mix = state.full_channel_mix_flag;
    let md01 = &mut state.md01[md01_index];

    md01.object_list.clear();
    if full_channel_mix {
        md01.object_list.push(OBJECT_ID_DEFAULT);
    } else {
        let count = reader.get_var(OBJECT_LIST_COUNT_WIDTHS);
        for _ in 0..count {
            let width = if reader.get() { 8 } else { 4 };
            md01.object_list.push(reader.get_n(width));
        }
    }
}

fn read_md01(
    state: &mut ParserState,
    reader: &mut BsSliceReader,
    md01_index: usize,
    pres_index: usize,
) {
    let full_channel_mix = state.full_channel_mix_flag;
    let is_sync_frame = state.is_sync_frame;
    let interactive_limits = state.interactive_obj_limits_present;
    let selectable = state.audio[pres_index].selectable;
    let md01 = &mut state.md01[md01_index];

    if selectable {
        for _ in 0..4 {
            // scaling data
            if reader.get() {
                reader.skip_n(5);
            }
        }

        if reader.get() {
            read_multi_frame_md(md01, reader, full_channel_mix, is_sync_frame);
        }
    }

    md01.object.fill(MdObject::default());
    if !full_channel_mix && reader.get() {
        reader.skip_n(11);
    }

    for position in 0..md01.object_list.len() {
        let id = md01.object_list[position];
        if !is_suitable_for_render(reader, id) {
            continue;
        }

        let slot = id.min(OBJECT_ID_DEFAULT) as usize;
        md01.object[slot].pres_index = pres_index;

        let mut start_flag = false;
        if !md01.object[slot].started {
            reader.skip_n((id != OBJECT_ID_DEFAULT) as u32);
            md01.object[slot].started = true;
            start_flag = true;
        }

        if !(OBJECT_GROUP_ID_START..=255).contains(&id) {
            read_object_metadata(
                reader,
                &mut md01.object[slot],
                start_flag,
                id,
                interactive_limits,
            );
        }

        // Only the first renderable object is evaluated.
        break;
    }
}

/// Object groups are always suitable; plain objects carry a gating bit and,
/// when rejected, a sized block of render data to skip.
fn is_suitable_for_render(reader: &mut BsSliceReader, object_id: u32) -> bool {
    if object_id >= OBJECT_GROUP_ID_START || reader.get() {
        return true;
    }

    reader.skip_n(1);
    let rejected_bits = reader.get_var(REJECTED_RENDER_WIDTHS);
    reader.skip_n(rejected_bits);

    false
}

fn read_object_metadata(
    reader: &mut BsSliceReader,
    object: &mut MdObject,
    start_frame: bool,
    object_id: u32,
    interactive_limits: bool,
) {
    reader.skip_n((object_id != OBJECT_ID_DEFAULT) as u32);

    if !start_frame {
        return;
    }

    object.rep_type = RepType::from_code(reader.get_n(3));
    let object_3d = object.rep_type.is_3d_metadata();

    if object.rep_type.is_ch_mask_based() {
        if object_id != OBJECT_ID_DEFAULT {
            reader.skip_n(3); // object importance level
            if reader.get() {
                let bits = if reader.get() { 3 } else { 5 };
                reader.skip_n(bits);
            }

            reader.get_var(OBJECT_MD_WIDTHS_A);
            reader.get_var(OBJECT_MD_WIDTHS_B);

            if reader.get() {
                reader.skip_n(8); // loudness
            }

            if reader.get() && interactive_limits && reader.get() {
                reader.skip_n(5 + 6 * object_3d as u32);
            }
        }

        read_ch_mask_params(reader, object);
    }
}

fn read_ch_mask_params(reader: &mut BsSliceReader, object: &mut MdObject) {
    let ch_index = if object.rep_type == RepType::Binaural {
        1
    } else {
        reader.get_n(4)
    };

    object.ch_activity_mask = match ch_index {
        14 => reader.get_n(16),
        15 => reader.get_n(32),
        index => CH_ACTIVITY_TABLE[index as usize],
    };
}

/// Static metadata spread over one or more packets. Sync frames restart
/// the accumulation; the packet count, packet size, and buffer are sized
/// there. Parsing over the accumulated buffer happens in "only-first"
/// mode after the first packet and in full mode after the last one.
fn read_multi_frame_md(
    md01: &mut Md01,
    reader: &mut BsSliceReader,
    full_channel_mix: bool,
    is_sync_frame: bool,
) {
    if is_sync_frame {
        md01.packets_acquired = 0;
        if full_channel_mix {
            md01.static_md_packets = 1;
            md01.static_md_packet_size = 0;
        } else {
            md01.static_md_packets = reader.get_var(PACKET_COUNT_WIDTHS) as usize + 1;
            md01.static_md_packet_size = reader.get_var(PACKET_SIZE_WIDTHS) as usize + 3;
        }

        let needed = md01.static_md_packets * md01.static_md_packet_size;
        if needed > md01.buf.len() {
            md01.buf.resize(needed, 0);
        }
        md01.gb_pos = 0;

        md01.static_md_update_flag = if md01.static_md_packets > 1 {
            reader.get()
        } else {
            true
        };
    }

    if md01.packets_acquired < md01.static_md_packets {
        let base = md01.packets_acquired * md01.static_md_packet_size;
        for offset in 0..md01.static_md_packet_size {
            md01.buf[base + offset] = reader.get_n(8) as u8;
        }
        md01.packets_acquired += 1;

        let wanted = md01.static_md_update_flag || !md01.static_md_extracted;
        if md01.packets_acquired == md01.static_md_packets {
            if wanted {
                read_static_md_params(md01, reader, full_channel_mix, false);
            }
        } else if md01.packets_acquired == 1 && wanted {
            read_static_md_params(md01, reader, full_channel_mix, true);
        }
    }
}

fn read_static_md_params(
    md01: &mut Md01,
    reader: &mut BsSliceReader,
    full_channel_mix: bool,
    only_first: bool,
) {
    let nominal_flag = if full_channel_mix {
        true
    } else {
        md01.get_md(reader, 1) != 0
    };

    let loudness_sets = if nominal_flag {
        if !full_channel_mix && md01.get_md(reader, 1) != 0 {
            3
        } else {
            1
        }
    } else {
        md01.get_md(reader, 4) + 1
    };

    for _ in 0..loudness_sets {
        skip_loudness_set(md01, reader, nominal_flag);
    }

    if only_first {
        return;
    }

    if !nominal_flag {
        md01.skip_md(reader, 1);
    }

    for _ in 0..3 {
        if md01.get_md(reader, 1) != 0 && md01.get_md(reader, 4) == 15 {
            md01.skip_md(reader, 15);
        }
        if md01.get_md(reader, 1) != 0 {
            md01.skip_md(reader, 36); // smooth metadata
        }
    }

    if !full_channel_mix {
        md01.gb_pos = md01.static_md_packets * md01.static_md_packet_size * 8;
    }
    md01.static_md_extracted = true;
}

fn skip_loudness_set(md01: &mut Md01, reader: &mut BsSliceReader, nominal_flag: bool) {
    md01.skip_md(reader, 6);
    if !nominal_flag {
        md01.skip_md(reader, 5);
    }
    md01.skip_md(reader, if nominal_flag { 2 } else { 4 });
}
