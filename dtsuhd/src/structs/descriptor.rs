//! Sample entry descriptor.
//!
//! After a sync frame is parsed, the per-object channel-activity mask of
//! the default audio object is translated into the normative channel mask
//! (ETSI TS 103 491 Table 7-28) and a host-side channel layout, and the
//! remaining MP4 SampleEntry fields are derived from the stream
//! parameters. The descriptor also serializes itself into the `udts`
//! extradata box consumed by MP4 muxers.

use std::io;

use bitstream_io::{BigEndian, BitWrite, BitWriter};

use crate::process::parse::ParserState;
use crate::structs::md01::{MdObject, RepType};

/// Host-side channel layout bits published in
/// [`DescriptorInfo::host_channel_mask`].
pub mod host {
    pub const FRONT_LEFT: u64 = 0x0000_0001;
    pub const FRONT_RIGHT: u64 = 0x0000_0002;
    pub const FRONT_CENTER: u64 = 0x0000_0004;
    pub const LOW_FREQUENCY: u64 = 0x0000_0008;
    pub const BACK_LEFT: u64 = 0x0000_0010;
    pub const BACK_RIGHT: u64 = 0x0000_0020;
    pub const FRONT_LEFT_OF_CENTER: u64 = 0x0000_0040;
    pub const FRONT_RIGHT_OF_CENTER: u64 = 0x0000_0080;
    pub const BACK_CENTER: u64 = 0x0000_0100;
    pub const SIDE_LEFT: u64 = 0x0000_0200;
    pub const SIDE_RIGHT: u64 = 0x0000_0400;
    pub const TOP_CENTER: u64 = 0x0000_0800;
    pub const TOP_FRONT_LEFT: u64 = 0x0000_1000;
    pub const TOP_FRONT_CENTER: u64 = 0x0000_2000;
    pub const TOP_FRONT_RIGHT: u64 = 0x0000_4000;
    pub const TOP_BACK_LEFT: u64 = 0x0000_8000;
    pub const TOP_BACK_CENTER: u64 = 0x0001_0000;
    pub const TOP_BACK_RIGHT: u64 = 0x0002_0000;
    pub const WIDE_LEFT: u64 = 0x0000_0000_8000_0000;
    pub const WIDE_RIGHT: u64 = 0x0000_0001_0000_0000;
    pub const SURROUND_DIRECT_LEFT: u64 = 0x0000_0002_0000_0000;
    pub const SURROUND_DIRECT_RIGHT: u64 = 0x0000_0004_0000_0000;
    pub const LOW_FREQUENCY_2: u64 = 0x0000_0008_0000_0000;
    pub const TOP_SIDE_LEFT: u64 = 0x0000_0010_0000_0000;
    pub const TOP_SIDE_RIGHT: u64 = 0x0000_0020_0000_0000;
    pub const BOTTOM_FRONT_CENTER: u64 = 0x0000_0040_0000_0000;
    pub const BOTTOM_FRONT_LEFT: u64 = 0x0000_0080_0000_0000;
    pub const BOTTOM_FRONT_RIGHT: u64 = 0x0000_0100_0000_0000;
}

/// Activity-mask translation rows: activity bit, normative channel mask,
/// host channel mask. Order is significant.
const ACTIVITY_MAP: [(u32, u32, u64); 20] = [
    (0x000001, 0x00000001, host::FRONT_CENTER),
    (0x000002, 0x00000006, host::FRONT_LEFT | host::FRONT_RIGHT),
    (0x000004, 0x00000018, host::SIDE_LEFT | host::SIDE_RIGHT),
    (0x000008, 0x00000020, host::LOW_FREQUENCY),
    (0x000010, 0x00000040, host::BACK_CENTER),
    (0x000020, 0x0000A000, host::TOP_FRONT_LEFT | host::TOP_FRONT_RIGHT),
    (0x000040, 0x00000180, host::BACK_LEFT | host::BACK_RIGHT),
    (0x000080, 0x00004000, host::TOP_FRONT_CENTER),
    (0x000100, 0x00080000, host::TOP_CENTER),
    (
        0x000200,
        0x00001800,
        host::FRONT_LEFT_OF_CENTER | host::FRONT_RIGHT_OF_CENTER,
    ),
    (0x000400, 0x00060000, host::WIDE_LEFT | host::WIDE_RIGHT),
    (
        0x000800,
        0x00000600,
        host::SURROUND_DIRECT_LEFT | host::SURROUND_DIRECT_RIGHT,
    ),
    (0x001000, 0x00010000, host::LOW_FREQUENCY_2),
    (0x002000, 0x00300000, host::TOP_SIDE_LEFT | host::TOP_SIDE_RIGHT),
    (0x004000, 0x00400000, host::TOP_BACK_CENTER),
    (0x008000, 0x01800000, host::TOP_BACK_LEFT | host::TOP_BACK_RIGHT),
    (0x010000, 0x02000000, host::BOTTOM_FRONT_CENTER),
    (
        0x020000,
        0x0C000000,
        host::BOTTOM_FRONT_LEFT | host::BOTTOM_FRONT_RIGHT,
    ),
    (0x140000, 0x30000000, host::TOP_FRONT_LEFT | host::TOP_FRONT_RIGHT),
    (0x080000, 0xC0000000, host::TOP_BACK_LEFT | host::TOP_BACK_RIGHT),
];

/// MP4 SampleEntry parameters for the stream, produced on sync frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorInfo {
    /// SampleEntry sub-box name: "dtsx", or "dtsy" past major version 2.
    pub coding_name: &'static str,
    pub base_sample_freq_code: u8,
    pub channel_count: u32,
    pub decoder_profile_code: u8,
    pub frame_duration_code: u8,
    pub max_payload_code: u8,
    pub num_pres_code: u8,
    pub rep_type: RepType,
    pub sample_rate: u32,
    pub sample_rate_mod: u8,
    /// Always 16 for DTS:X Profile 2.
    pub sample_size: u8,
    /// Channel mask as defined by ETSI TS 103 491.
    pub channel_mask: u32,
    /// Channel mask in the host layout above.
    pub host_channel_mask: u64,
}

impl DescriptorInfo {
    pub(crate) fn from_state(state: &ParserState) -> Self {
        let mut info = Self {
            coding_name: if state.major_version > 2 { "dtsy" } else { "dtsx" },
            base_sample_freq_code: (state.sample_rate == 48000) as u8,
            channel_count: 0,
            decoder_profile_code: (state.major_version - 2) as u8,
            frame_duration_code: state.frame_duration_code,
            max_payload_code: (state.major_version > 2) as u8,
            num_pres_code: (state.num_audio_pres - 1) as u8,
            rep_type: RepType::default(),
            sample_rate: state.sample_rate,
            sample_rate_mod: state.sample_rate_mod,
            sample_size: 16,
            channel_mask: 0,
            host_channel_mask: 0,
        };

        if let Some(object) = find_default_audio(state) {
            let (channel_mask, host_channel_mask) = translate_activity(object.ch_activity_mask);
            info.channel_mask = channel_mask;
            info.host_channel_mask = host_channel_mask;
            info.channel_count = channel_mask.count_ones();
            info.rep_type = object.rep_type;
        }

        info
    }

    /// Serializes the `udts` extradata box: big-endian, bit-packed, padded
    /// to a byte boundary, with the total byte size written back into the
    /// leading 32-bit word.
    pub fn extradata(&self) -> io::Result<Vec<u8>> {
        let mut writer = BitWriter::<_, BigEndian>::new(Vec::new());

        writer.write::<32, u32>(0)?; // box size, patched below
        for byte in b"udts" {
            writer.write::<8, u8>(*byte)?;
        }
        writer.write::<6, u8>(self.decoder_profile_code & 0x3F)?;
        writer.write::<2, u8>(self.frame_duration_code & 0x3)?;
        writer.write::<3, u8>(self.max_payload_code & 0x7)?;
        writer.write::<5, u8>(self.num_pres_code & 0x1F)?;
        writer.write::<32, u32>(self.channel_mask)?;
        writer.write::<1, u8>(self.base_sample_freq_code & 0x1)?;
        writer.write::<2, u8>(self.sample_rate_mod & 0x3)?;
        writer.write::<3, u8>(self.rep_type.code())?;
        writer.write::<3, u8>(0)?; // reserved
        writer.write::<1, u8>(0)?; // reserved
        for _ in 0..=self.num_pres_code {
            writer.write_bit(false)?; // id tag presence per presentation
        }
        writer.byte_align()?;

        let mut data = writer.into_writer();
        let size = data.len() as u32;
        data[..4].copy_from_slice(&size.to_be_bytes());
        Ok(data)
    }
}

fn translate_activity(activity_mask: u32) -> (u32, u64) {
    let mut channel_mask = 0u32;
    let mut host_channel_mask = 0u64;
    for (activity, channels, host_channels) in ACTIVITY_MAP {
        if activity & activity_mask != 0 {
            channel_mask |= channels;
            host_channel_mask |= host_channels;
        }
    }
    (channel_mask, host_channel_mask)
}

/// Selects the stream's default audio object: within the first metadata
/// chunk holding any started object of a selectable presentation, the
/// object with the smallest presentation index wins, ties broken by the
/// smallest object id.
fn find_default_audio(state: &ParserState) -> Option<&MdObject> {
    for md01 in &state.md01 {
        let mut best: Option<usize> = None;

        for (id, object) in md01.object.iter().enumerate() {
            if object.started && state.audio[object.pres_index].selectable {
                match best {
                    Some(current) if object.pres_index >= md01.object[current].pres_index => {}
                    _ => best = Some(id),
                }
            }
        }

        if let Some(id) = best {
            return Some(&md01.object[id]);
        }
    }

    None
}

#[test]
fn single_activity_bits_translate_to_consistent_counts() {
    for (activity, channels, host_channels) in ACTIVITY_MAP {
        let (channel_mask, host_channel_mask) = translate_activity(activity);
        assert_eq!(channel_mask, channels);
        assert_eq!(host_channel_mask, host_channels);
        assert!(channel_mask.count_ones() >= 1);
    }

    // Mono: activity bit 0 maps to the single front-center channel.
    let (mask, host_mask) = translate_activity(0x1);
    assert_eq!(mask.count_ones(), 1);
    assert_eq!(host_mask, host::FRONT_CENTER);
}

#[test]
fn udts_box_layout() {
    let info = DescriptorInfo {
        coding_name: "dtsx",
        base_sample_freq_code: 1,
        channel_count: 1,
        decoder_profile_code: 0,
        frame_duration_code: 0,
        max_payload_code: 0,
        num_pres_code: 0,
        rep_type: RepType::ChMaskBased,
        sample_rate: 48000,
        sample_rate_mod: 0,
        sample_size: 16,
        channel_mask: 0x1,
        host_channel_mask: host::FRONT_CENTER,
    };

    let data = info.extradata().unwrap();
    assert_eq!(data.len(), 16);
    assert_eq!(&data[..4], &16u32.to_be_bytes());
    assert_eq!(&data[4..8], b"udts");
    // decoder profile, duration code, payload code, presentation count
    assert_eq!(&data[8..10], &[0x00, 0x00]);
    // normative channel mask
    assert_eq!(&data[10..14], &[0x00, 0x00, 0x00, 0x01]);
    // base freq code 1, then modifier, rep type, reserved, id tags, padding
    assert_eq!(&data[14..16], &[0x80, 0x00]);
}
