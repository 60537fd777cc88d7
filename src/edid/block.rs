//! CTA-861 data blocks.

use super::{Error, PhysicalAddress};

pub const TAG_AUDIO: u8 = 1;
pub const TAG_VIDEO: u8 = 2;
pub const TAG_VENDOR: u8 = 3;
pub const TAG_SPEAKER: u8 = 4;
pub const TAG_EXTENDED: u8 = 7;

pub const EXT_VIDEO_CAPABILITY: u8 = 0x00;
pub const EXT_COLORIMETRY: u8 = 0x05;
pub const EXT_HDR_STATIC: u8 = 0x06;
pub const EXT_HDR_DYNAMIC: u8 = 0x07;
pub const EXT_YUV420_VIDEO: u8 = 0x0E;
pub const EXT_YUV420_CAPABILITY_MAP: u8 = 0x0F;

/// IEEE OUI of HDMI Licensing, little endian as stored in the block.
pub const OUI_HDMI: [u8; 3] = [0x03, 0x0C, 0x00];
/// IEEE OUI of the HDMI Forum, little endian as stored in the block.
pub const OUI_HDMI_FORUM: [u8; 3] = [0xD8, 0x5D, 0xC4];

/// Largest payload a data block header can describe.
pub const MAX_PAYLOAD: usize = 31;

pub const FORMAT_LPCM: u8 = 1;

const SVD_NATIVE: u8 = 0x80;
const VSDB_HDMI_VIDEO_PRESENT: u8 = 0x20;
const VSDB_I_LATENCY_PRESENT: u8 = 0x40;
const VSDB_LATENCY_PRESENT: u8 = 0x80;
const VSDB_3D_PRESENT: u8 = 0x80;
const HF_SCDC_PRESENT: u8 = 0x80;

pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

/// One entry of the video data block.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ShortVideoDescriptor {
    pub vic: u8,
    /// The sink prefers this format.
    pub native: bool,
}

impl ShortVideoDescriptor {
    #[must_use]
    pub const fn new(vic: u8) -> Self {
        Self { vic, native: false }
    }

    #[must_use]
    pub const fn native(vic: u8) -> Self {
        Self { vic, native: true }
    }
}

impl From<u8> for ShortVideoDescriptor {
    /// Bytes 129..=192 encode VICs 1..=64 with the native flag; every other
    /// byte is a plain 8-bit VIC.
    fn from(value: u8) -> Self {
        if (129..=192).contains(&value) {
            Self::native(value & !SVD_NATIVE)
        } else {
            Self::new(value)
        }
    }
}

impl From<ShortVideoDescriptor> for u8 {
    fn from(svd: ShortVideoDescriptor) -> u8 {
        if svd.native && (1..=64).contains(&svd.vic) {
            svd.vic | SVD_NATIVE
        } else {
            svd.vic
        }
    }
}

/// One entry of the audio data block.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ShortAudioDescriptor {
    /// Audio format code (1 = LPCM, 2 = AC-3, ...).
    pub format: u8,
    pub max_channels: u8,
    /// Bit mask of 32, 44.1, 48, 88.2, 96, 176.4 and 192 kHz.
    pub sample_rates: u8,
    /// Bit depths for LPCM, maximum bit rate / 8 kHz for formats 2..=8,
    /// format dependent otherwise.
    pub detail: u8,
}

impl ShortAudioDescriptor {
    #[must_use]
    pub const fn new(format: u8, max_channels: u8, sample_rates: u8, detail: u8) -> Self {
        Self {
            format,
            max_channels,
            sample_rates,
            detail,
        }
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            format: (bytes[0] >> 3) & 0x0F,
            max_channels: (bytes[0] & 0x07) + 1,
            sample_rates: bytes[1] & 0x7F,
            detail: bytes[2],
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 3] {
        [
            ((self.format & 0x0F) << 3) | (self.max_channels.saturating_sub(1) & 0x07),
            self.sample_rates & 0x7F,
            self.detail,
        ]
    }
}

/// HDMI Licensing vendor specific data block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HdmiVsdb {
    pub physical_address: PhysicalAddress,
    /// Everything after the physical address: feature flags, max TMDS clock,
    /// latency and HDMI video fields.
    pub extra: heapless::Vec<u8, 26>,
}

impl HdmiVsdb {
    /// The smallest valid block: a physical address and nothing else.
    #[must_use]
    pub fn minimal(physical_address: PhysicalAddress) -> Self {
        Self {
            physical_address,
            extra: heapless::Vec::new(),
        }
    }

    /// Supports_AI and deep colour flags.
    #[must_use]
    pub fn flags(&self) -> u8 {
        self.extra.first().copied().unwrap_or(0)
    }

    /// Maximum TMDS clock in units of 5 MHz, if declared.
    #[must_use]
    pub fn max_tmds_clock(&self) -> Option<u8> {
        self.extra.get(1).copied().filter(|clock| *clock != 0)
    }

    /// Whether the sink declares 3D support in the HDMI video fields.
    #[must_use]
    pub fn three_d_present(&self) -> bool {
        let Some(&fields) = self.extra.get(2) else {
            return false;
        };
        if fields & VSDB_HDMI_VIDEO_PRESENT == 0 {
            return false;
        }
        let mut index = 3;
        if fields & VSDB_LATENCY_PRESENT != 0 {
            index += 2;
        }
        if fields & VSDB_I_LATENCY_PRESENT != 0 {
            index += 2;
        }
        self.extra
            .get(index)
            .is_some_and(|video| video & VSDB_3D_PRESENT != 0)
    }
}

/// HDMI Forum vendor specific data block (HF-VSDB).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HdmiForumVsdb {
    /// Everything after the OUI: version, max TMDS character rate, feature
    /// flags.
    pub payload: heapless::Vec<u8, 28>,
}

impl HdmiForumVsdb {
    /// Maximum TMDS character rate in units of 5 MHz.
    #[must_use]
    pub fn max_tmds_rate(&self) -> u8 {
        self.payload.get(1).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn scdc_present(&self) -> bool {
        self.payload
            .get(2)
            .is_some_and(|flags| flags & HF_SCDC_PRESENT != 0)
    }

    /// Deep colour 4:2:0 flags.
    #[must_use]
    pub fn deep_color_420(&self) -> u8 {
        self.payload.get(3).copied().unwrap_or(0) & 0x07
    }
}

/// HDR static metadata data block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HdrStaticMetadata {
    /// Supported electro-optical transfer functions.
    pub eotf: u8,
    /// Supported static metadata descriptor types.
    pub descriptors: u8,
    /// Desired max, max frame-average and min luminance, as far as present.
    pub luminance: heapless::Vec<u8, 3>,
}

/// A parsed CTA-861 data block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataBlock {
    Audio(heapless::Vec<ShortAudioDescriptor, 10>),
    Video(heapless::Vec<ShortVideoDescriptor, MAX_PAYLOAD>),
    HdmiVendor(HdmiVsdb),
    HdmiForumVendor(HdmiForumVsdb),
    SpeakerAllocation([u8; 3]),
    VideoCapability(u8),
    Colorimetry([u8; 2]),
    HdrStaticMetadata(HdrStaticMetadata),
    /// Opaque HDR dynamic metadata payload.
    HdrDynamicMetadata(heapless::Vec<u8, 30>),
    /// VICs the sink accepts only with 4:2:0 sampling.
    Yuv420Video(heapless::Vec<u8, 30>),
    /// Bitmap over the video data block of VICs that also accept 4:2:0.
    Yuv420CapabilityMap(heapless::Vec<u8, 30>),
    /// Any block this crate does not interpret, kept verbatim.
    Other { tag: u8, payload: Payload },
}

impl DataBlock {
    /// Interpret the payload of a block with the given tag.
    ///
    /// # Errors
    /// - if the payload is longer than a data block can be
    pub fn parse(tag: u8, payload: &[u8]) -> Result<Self, Error> {
        if payload.len() > MAX_PAYLOAD {
            return Err(Error::PayloadTooLong(payload.len()));
        }
        let block = match (tag, payload) {
            (TAG_AUDIO, _) => DataBlock::Audio(
                payload
                    .chunks_exact(3)
                    .map(|sad| ShortAudioDescriptor::from_bytes([sad[0], sad[1], sad[2]]))
                    .collect(),
            ),
            (TAG_VIDEO, _) => {
                DataBlock::Video(payload.iter().map(|byte| (*byte).into()).collect())
            }
            (TAG_VENDOR, [a, b, c, hi, lo, extra @ ..]) if [*a, *b, *c] == OUI_HDMI => {
                DataBlock::HdmiVendor(HdmiVsdb {
                    physical_address: PhysicalAddress::from_bytes([*hi, *lo]),
                    extra: copy(extra)?,
                })
            }
            (TAG_VENDOR, [a, b, c, rest @ ..]) if [*a, *b, *c] == OUI_HDMI_FORUM => {
                DataBlock::HdmiForumVendor(HdmiForumVsdb {
                    payload: copy(rest)?,
                })
            }
            (TAG_SPEAKER, [first, rest @ ..]) => DataBlock::SpeakerAllocation([
                *first,
                rest.first().copied().unwrap_or(0),
                rest.get(1).copied().unwrap_or(0),
            ]),
            (TAG_EXTENDED, [EXT_VIDEO_CAPABILITY, flags, ..]) => DataBlock::VideoCapability(*flags),
            (TAG_EXTENDED, [EXT_COLORIMETRY, first, rest @ ..]) => {
                DataBlock::Colorimetry([*first, rest.first().copied().unwrap_or(0)])
            }
            (TAG_EXTENDED, [EXT_HDR_STATIC, eotf, rest @ ..]) => {
                DataBlock::HdrStaticMetadata(HdrStaticMetadata {
                    eotf: *eotf,
                    descriptors: rest.first().copied().unwrap_or(0),
                    luminance: rest.iter().skip(1).take(3).copied().collect(),
                })
            }
            (TAG_EXTENDED, [EXT_HDR_DYNAMIC, rest @ ..]) => {
                DataBlock::HdrDynamicMetadata(copy(rest)?)
            }
            (TAG_EXTENDED, [EXT_YUV420_VIDEO, rest @ ..]) => DataBlock::Yuv420Video(copy(rest)?),
            (TAG_EXTENDED, [EXT_YUV420_CAPABILITY_MAP, rest @ ..]) => {
                DataBlock::Yuv420CapabilityMap(copy(rest)?)
            }
            _ => DataBlock::Other {
                tag,
                payload: copy(payload)?,
            },
        };
        Ok(block)
    }

    /// Tag and payload of the block, ready to be framed by a header byte.
    ///
    /// # Errors
    /// - if the payload does not fit in a data block
    pub fn encode(&self) -> Result<(u8, Payload), Error> {
        let mut payload = Payload::new();
        let tag = match self {
            DataBlock::Audio(sads) => {
                for sad in sads {
                    extend(&mut payload, &sad.to_bytes())?;
                }
                TAG_AUDIO
            }
            DataBlock::Video(svds) => {
                for svd in svds {
                    extend(&mut payload, &[u8::from(*svd)])?;
                }
                TAG_VIDEO
            }
            DataBlock::HdmiVendor(vsdb) => {
                extend(&mut payload, &OUI_HDMI)?;
                extend(&mut payload, &vsdb.physical_address.to_bytes())?;
                extend(&mut payload, &vsdb.extra)?;
                TAG_VENDOR
            }
            DataBlock::HdmiForumVendor(vsdb) => {
                extend(&mut payload, &OUI_HDMI_FORUM)?;
                extend(&mut payload, &vsdb.payload)?;
                TAG_VENDOR
            }
            DataBlock::SpeakerAllocation(speakers) => {
                extend(&mut payload, speakers)?;
                TAG_SPEAKER
            }
            DataBlock::VideoCapability(flags) => {
                extend(&mut payload, &[EXT_VIDEO_CAPABILITY, *flags])?;
                TAG_EXTENDED
            }
            DataBlock::Colorimetry(colorimetry) => {
                extend(&mut payload, &[EXT_COLORIMETRY])?;
                extend(&mut payload, colorimetry)?;
                TAG_EXTENDED
            }
            DataBlock::HdrStaticMetadata(hdr) => {
                extend(&mut payload, &[EXT_HDR_STATIC, hdr.eotf, hdr.descriptors])?;
                extend(&mut payload, &hdr.luminance)?;
                TAG_EXTENDED
            }
            DataBlock::HdrDynamicMetadata(bytes) => {
                extend(&mut payload, &[EXT_HDR_DYNAMIC])?;
                extend(&mut payload, bytes)?;
                TAG_EXTENDED
            }
            DataBlock::Yuv420Video(vics) => {
                extend(&mut payload, &[EXT_YUV420_VIDEO])?;
                extend(&mut payload, vics)?;
                TAG_EXTENDED
            }
            DataBlock::Yuv420CapabilityMap(map) => {
                extend(&mut payload, &[EXT_YUV420_CAPABILITY_MAP])?;
                extend(&mut payload, map)?;
                TAG_EXTENDED
            }
            DataBlock::Other {
                tag,
                payload: bytes,
            } => {
                extend(&mut payload, bytes)?;
                *tag
            }
        };
        Ok((tag, payload))
    }

    /// Append the framed block to `out`. Returns the number of bytes written.
    ///
    /// # Errors
    /// - if the payload does not fit in a data block
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<usize, Error> {
        let (tag, payload) = self.encode()?;
        out.push((tag << 5) | payload.len() as u8);
        out.extend_from_slice(&payload);
        Ok(payload.len() + 1)
    }

    /// Size of the framed block in bytes.
    ///
    /// # Errors
    /// - if the payload does not fit in a data block
    pub fn encoded_len(&self) -> Result<usize, Error> {
        Ok(self.encode()?.1.len() + 1)
    }
}

fn copy<const N: usize>(bytes: &[u8]) -> Result<heapless::Vec<u8, N>, Error> {
    heapless::Vec::from_slice(bytes).map_err(|_| Error::PayloadTooLong(bytes.len()))
}

fn extend(payload: &mut Payload, bytes: &[u8]) -> Result<(), Error> {
    payload
        .extend_from_slice(bytes)
        .map_err(|_| Error::PayloadTooLong(payload.len() + bytes.len()))
}

/// A framed data block as found in an extension.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawDataBlock<'a> {
    pub tag: u8,
    /// Offset of the header byte within the data block collection.
    pub offset: usize,
    pub payload: &'a [u8],
}

/// Iterator over the framed blocks of a data block collection.
#[derive(Clone, Debug)]
pub struct DataBlocks<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> DataBlocks<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }
}

impl<'a> Iterator for DataBlocks<'a> {
    type Item = Result<RawDataBlock<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = *self.bytes.get(self.offset)?;
        let offset = self.offset;
        let start = offset + 1;
        let end = start + usize::from(header & 0x1F);
        if end > self.bytes.len() {
            self.offset = self.bytes.len();
            return Some(Err(Error::DataBlockOverrun { offset }));
        }
        self.offset = end;
        Some(Ok(RawDataBlock {
            tag: header >> 5,
            offset,
            payload: &self.bytes[start..end],
        }))
    }
}
