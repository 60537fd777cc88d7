//! Built-in descriptor and hardware limits of the receiver.
//!
//! The built-in descriptor is what the receiver advertises when no valid sink
//! EDID is available, and (narrowed by [`EdidConfig`]) the local side of every
//! intersection.

use super::block::{
    DataBlock, FORMAT_LPCM, HdmiForumVsdb, HdmiVsdb, HdrStaticMetadata, ShortAudioDescriptor,
    ShortVideoDescriptor,
};
use super::capability::VicSet;
use super::descriptor::{BaseBlock, CapabilityDescriptor, CtaExtension};
use super::{BLOCK_SIZE, EdidConfig, PhysicalAddress};

/// Limits of the receiver's video and audio path, applied in pass-through
/// composition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HardwareCeiling {
    pub video: VicSet,
    pub yuv420: VicSet,
    /// One bit per audio format code.
    pub audio_formats: u16,
    pub max_channels: u8,
    pub sample_rates: u8,
    pub speakers: [u8; 3],
    pub colorimetry: [u8; 2],
    pub vsdb_flags: u8,
    /// 5 MHz units.
    pub max_tmds_clock: u8,
    /// 5 MHz units.
    pub max_tmds_rate: u8,
    pub hdr_eotf: u8,
    pub hdr_descriptors: u8,
}

pub const HARDWARE_CEILING: HardwareCeiling = HardwareCeiling {
    video: VicSet::new().with_range(1, 107),
    yuv420: VicSet::new()
        .with(96)
        .with(97)
        .with(101)
        .with(102)
        .with(106)
        .with(107),
    // everything except formats 8, 9, 13 and 14
    audio_formats: 0x9CFE,
    max_channels: 8,
    sample_rates: 0x7F,
    speakers: [0x7F, 0x07, 0x00],
    colorimetry: [0xFF, 0x8F],
    vsdb_flags: 0xF8,
    max_tmds_clock: 0x44,
    max_tmds_rate: 0x78,
    hdr_eotf: 0x0F,
    hdr_descriptors: 0x01,
};

#[rustfmt::skip]
const BASE_BLOCK: [u8; BLOCK_SIZE] = [
    // header
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
    // manufacturer "HRX", product 1, no serial, week 1 of 2024
    0x22, 0x58, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x22,
    // EDID 1.3
    0x01, 0x03,
    // digital input, 80 x 45 cm, gamma 2.2, RGB and YCbCr
    0x80, 0x50, 0x2D, 0x78, 0x0A,
    // chromaticity
    0xEE, 0x91, 0xA3, 0x54, 0x4C, 0x99, 0x26, 0x0F, 0x50, 0x54,
    // established timings: 640x480@60
    0x20, 0x00, 0x00,
    // no standard timings
    0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
    0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
    // 1280x720p60
    0x01, 0x1D, 0x00, 0x72, 0x51, 0xD0, 0x1E, 0x20, 0x6E,
    0x28, 0x55, 0x00, 0xC4, 0x8E, 0x21, 0x00, 0x00, 0x1E,
    // 720x480p60
    0x8C, 0x0A, 0xD0, 0x8A, 0x20, 0xE0, 0x2D, 0x10, 0x10,
    0x3E, 0x96, 0x00, 0x58, 0xC2, 0x21, 0x00, 0x00, 0x18,
    // monitor name
    0x00, 0x00, 0x00, 0xFC, 0x00, b'H', b'D', b'M', b'I',
    b' ', b'R', b'X', b'\n', 0x20, 0x20, 0x20, 0x20, 0x20,
    // range limits: 23-75 Hz, 15-80 kHz, 230 MHz
    0x00, 0x00, 0x00, 0xFD, 0x00, 0x17, 0x4B, 0x0F, 0x50,
    0x17, 0x00, 0x0A, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
    // one extension, checksum
    0x01, 0x00,
];

/// 1920x1080p60
const DTD_1080P: [u8; 18] = [
    0x02, 0x3A, 0x80, 0x18, 0x71, 0x38, 0x2D, 0x40, 0x58, 0x2C, 0x45, 0x00, 0xC4, 0x8E, 0x21,
    0x00, 0x00, 0x1E,
];

const VIDEO: [u8; 16] = [16, 31, 4, 19, 5, 20, 2, 3, 17, 18, 1, 93, 94, 95, 96, 97];
const NATIVE_VIC: u8 = 16;

const AUDIO: [[u8; 3]; 8] = [
    [0x09, 0x7F, 0x07], // LPCM 2ch
    [0x0F, 0x7F, 0x07], // LPCM 8ch
    [0x15, 0x07, 0x50], // AC-3
    [0x3D, 0x07, 0xC0], // DTS
    [0x35, 0x07, 0x50], // AAC
    [0x57, 0x06, 0x03], // E-AC-3
    [0x5F, 0x7E, 0x03], // DTS-HD
    [0x67, 0x54, 0x03], // MAT
];

/// Front left/right, LFE, front center, rear left/right, rear center.
const SPEAKERS: [u8; 3] = [0x4F, 0x00, 0x00];

/// The receiver's own descriptor.
#[must_use]
pub fn builtin_descriptor() -> CapabilityDescriptor {
    let video = VIDEO
        .iter()
        .map(|vic| {
            if *vic == NATIVE_VIC {
                ShortVideoDescriptor::native(*vic)
            } else {
                ShortVideoDescriptor::new(*vic)
            }
        })
        .collect();
    let audio = AUDIO
        .iter()
        .map(|sad| ShortAudioDescriptor::from_bytes(*sad))
        .collect();

    let extension = CtaExtension {
        revision: 3,
        flags: 0x70,
        blocks: vec![
            DataBlock::Video(video),
            DataBlock::Audio(audio),
            DataBlock::SpeakerAllocation(SPEAKERS),
            DataBlock::HdmiVendor(HdmiVsdb {
                physical_address: PhysicalAddress::new(0x1000),
                extra: [0xB8, 0x3C, 0x20, 0x80, 0x00].into_iter().collect(),
            }),
            DataBlock::HdmiForumVendor(HdmiForumVsdb {
                payload: [0x01, 0x78, 0x80, 0x03].into_iter().collect(),
            }),
            DataBlock::VideoCapability(0x40),
            DataBlock::Colorimetry([0xE3, 0x01]),
            DataBlock::HdrStaticMetadata(HdrStaticMetadata {
                eotf: 0x0F,
                descriptors: 0x01,
                luminance: heapless::Vec::new(),
            }),
            // VICs 96 and 97 sit at positions 14 and 15
            DataBlock::Yuv420CapabilityMap([0x00, 0xC0].into_iter().collect()),
        ],
        detailed_timings: vec![DTD_1080P],
    };

    let base = BaseBlock::from_raw(BASE_BLOCK);
    CapabilityDescriptor {
        base: BaseBlock::from_raw(base.to_bytes(1)),
        extension: Some(extension),
    }
}

/// The built-in descriptor narrowed by configuration. This is the local side
/// of every intersection.
#[must_use]
pub fn local_descriptor(config: &EdidConfig) -> CapabilityDescriptor {
    let mut descriptor = builtin_descriptor();
    if !config.stereo_audio_only {
        return descriptor;
    }
    if let Some(extension) = descriptor.extension.as_mut() {
        for block in &mut extension.blocks {
            match block {
                DataBlock::Audio(sads) => {
                    sads.retain(|sad| sad.format == FORMAT_LPCM && sad.max_channels == 2);
                }
                DataBlock::SpeakerAllocation(speakers) => *speakers = [0x01, 0x00, 0x00],
                _ => {}
            }
        }
    }
    descriptor
}
