use tracing::{debug, trace};

use super::block::{
    DataBlock, DataBlocks, HdmiForumVsdb, HdmiVsdb, HdrStaticMetadata, OUI_HDMI,
    ShortAudioDescriptor, ShortVideoDescriptor, TAG_VENDOR,
};
use super::checksum::{block_checksum, finalize_checksum, verify};
use super::timing::{DESCRIPTOR_SIZE, is_timing};
use super::{BLOCK_SIZE, Error, MAX_EXTENSIONS, PhysicalAddress};

const HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
const VERSION_OFFSET: usize = 0x12;
const EXTENSION_COUNT_OFFSET: usize = 0x7E;
const DESCRIPTORS_OFFSET: usize = 0x36;
/// Number of 18-byte descriptor slots in the base block.
pub const BASE_DESCRIPTORS: usize = 4;

const CTA_TAG: u8 = 0x02;
const CTA_MIN_REVISION: u8 = 3;
/// First byte of the data block collection in a CTA extension.
const CTA_BLOCKS_OFFSET: usize = 4;

/// The 128-byte EDID base block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BaseBlock([u8; BLOCK_SIZE]);

impl BaseBlock {
    /// Validate and wrap a base block.
    ///
    /// # Errors
    /// - if the checksum does not match
    /// - if the fixed header pattern is missing
    /// - if the EDID version is not 1
    pub fn parse(bytes: &[u8; BLOCK_SIZE]) -> Result<Self, Error> {
        verify(0, bytes)?;
        if bytes[..HEADER.len()] != HEADER {
            return Err(Error::InvalidHeader);
        }
        if bytes[VERSION_OFFSET] != 1 {
            return Err(Error::UnsupportedVersion(bytes[VERSION_OFFSET]));
        }
        Ok(Self(*bytes))
    }

    /// Wrap a base block without validation.
    #[must_use]
    pub const fn from_raw(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }

    #[must_use]
    pub fn extension_count(&self) -> u8 {
        self.0[EXTENSION_COUNT_OFFSET]
    }

    /// The descriptor in slot `index` (0..=3).
    #[must_use]
    pub fn descriptor(&self, index: usize) -> [u8; DESCRIPTOR_SIZE] {
        let start = DESCRIPTORS_OFFSET + DESCRIPTOR_SIZE * index.min(BASE_DESCRIPTORS - 1);
        let mut descriptor = [0u8; DESCRIPTOR_SIZE];
        descriptor.copy_from_slice(&self.0[start..start + DESCRIPTOR_SIZE]);
        descriptor
    }

    pub fn set_descriptor(&mut self, index: usize, descriptor: &[u8; DESCRIPTOR_SIZE]) {
        let start = DESCRIPTORS_OFFSET + DESCRIPTOR_SIZE * index.min(BASE_DESCRIPTORS - 1);
        self.0[start..start + DESCRIPTOR_SIZE].copy_from_slice(descriptor);
    }

    /// Copy bytes `range` from another base block.
    pub fn copy_range(&mut self, other: &BaseBlock, range: std::ops::RangeInclusive<usize>) {
        self.0[range.clone()].copy_from_slice(&other.0[range]);
    }

    /// Serialize with the given extension count and a fresh checksum.
    #[must_use]
    pub fn to_bytes(&self, extension_count: u8) -> [u8; BLOCK_SIZE] {
        let mut bytes = self.0;
        bytes[EXTENSION_COUNT_OFFSET] = extension_count;
        finalize_checksum(&mut bytes);
        bytes
    }
}

/// A CTA-861 extension block: data block collection plus detailed timings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CtaExtension {
    pub revision: u8,
    /// Underscan, basic audio and YCbCr support flags (upper nibble).
    pub flags: u8,
    pub blocks: Vec<DataBlock>,
    pub detailed_timings: Vec<[u8; DESCRIPTOR_SIZE]>,
}

impl CtaExtension {
    /// Parse extension block number `index`.
    ///
    /// # Errors
    /// - if the block is not a CTA-861 extension
    /// - if the checksum does not match
    /// - if the revision is below 3
    /// - if the detailed timing offset points outside the block
    /// - if a data block runs past the data block collection
    pub fn parse(index: u8, bytes: &[u8; BLOCK_SIZE]) -> Result<Self, Error> {
        if bytes[0] != CTA_TAG {
            return Err(Error::InvalidExtensionTag(bytes[0]));
        }
        verify(index, bytes)?;
        let revision = bytes[1];
        if revision < CTA_MIN_REVISION {
            return Err(Error::UnsupportedRevision(revision));
        }
        let dtd_offset = bytes[2];
        let mut extension = Self {
            revision,
            flags: bytes[3] & 0xF0,
            blocks: Vec::new(),
            detailed_timings: Vec::new(),
        };
        if dtd_offset == 0 {
            return Ok(extension);
        }
        let dtd_start = usize::from(dtd_offset);
        if !(CTA_BLOCKS_OFFSET..BLOCK_SIZE).contains(&dtd_start) {
            return Err(Error::InvalidTimingOffset(dtd_offset));
        }

        for raw in DataBlocks::new(&bytes[CTA_BLOCKS_OFFSET..dtd_start]) {
            let raw = raw?;
            trace!("Data block tag {} with {} bytes", raw.tag, raw.payload.len());
            extension.blocks.push(DataBlock::parse(raw.tag, raw.payload)?);
        }

        let mut start = dtd_start;
        while start + DESCRIPTOR_SIZE < BLOCK_SIZE {
            let mut descriptor = [0u8; DESCRIPTOR_SIZE];
            descriptor.copy_from_slice(&bytes[start..start + DESCRIPTOR_SIZE]);
            if !is_timing(&descriptor) {
                break;
            }
            extension.detailed_timings.push(descriptor);
            start += DESCRIPTOR_SIZE;
        }
        Ok(extension)
    }

    /// Number of bytes the extension needs, excluding the checksum.
    ///
    /// # Errors
    /// - if a data block cannot be encoded
    pub fn encoded_len(&self) -> Result<usize, Error> {
        let mut len = CTA_BLOCKS_OFFSET + DESCRIPTOR_SIZE * self.detailed_timings.len();
        for block in &self.blocks {
            len += block.encoded_len()?;
        }
        Ok(len)
    }

    /// Serialize the extension with a fresh checksum.
    ///
    /// # Errors
    /// - if the blocks and timings do not fit in 127 bytes
    pub fn to_bytes(&self) -> Result<[u8; BLOCK_SIZE], Error> {
        let mut collection = Vec::with_capacity(BLOCK_SIZE);
        for block in &self.blocks {
            block.write_to(&mut collection)?;
        }
        let len = self.encoded_len()?;
        if len > BLOCK_SIZE - 1 {
            return Err(Error::ExtensionOverflow(len));
        }

        let mut bytes = [0u8; BLOCK_SIZE];
        bytes[0] = CTA_TAG;
        bytes[1] = self.revision;
        bytes[2] = (CTA_BLOCKS_OFFSET + collection.len()) as u8;
        bytes[3] = self.flags & 0xF0;
        let mut cursor = CTA_BLOCKS_OFFSET;
        bytes[cursor..cursor + collection.len()].copy_from_slice(&collection);
        cursor += collection.len();
        for descriptor in &self.detailed_timings {
            bytes[cursor..cursor + DESCRIPTOR_SIZE].copy_from_slice(descriptor);
            cursor += DESCRIPTOR_SIZE;
        }
        finalize_checksum(&mut bytes);
        Ok(bytes)
    }

    fn find<'a, T>(&'a self, select: impl Fn(&'a DataBlock) -> Option<T>) -> Option<T> {
        self.blocks.iter().find_map(select)
    }

    #[must_use]
    pub fn video(&self) -> Option<&[ShortVideoDescriptor]> {
        self.find(|block| match block {
            DataBlock::Video(svds) => Some(svds.as_slice()),
            _ => None,
        })
    }

    #[must_use]
    pub fn audio(&self) -> Option<&[ShortAudioDescriptor]> {
        self.find(|block| match block {
            DataBlock::Audio(sads) => Some(sads.as_slice()),
            _ => None,
        })
    }

    #[must_use]
    pub fn hdmi_vsdb(&self) -> Option<&HdmiVsdb> {
        self.find(|block| match block {
            DataBlock::HdmiVendor(vsdb) => Some(vsdb),
            _ => None,
        })
    }

    #[must_use]
    pub fn hdmi_forum_vsdb(&self) -> Option<&HdmiForumVsdb> {
        self.find(|block| match block {
            DataBlock::HdmiForumVendor(vsdb) => Some(vsdb),
            _ => None,
        })
    }

    #[must_use]
    pub fn speaker_allocation(&self) -> Option<[u8; 3]> {
        self.find(|block| match block {
            DataBlock::SpeakerAllocation(speakers) => Some(*speakers),
            _ => None,
        })
    }

    #[must_use]
    pub fn video_capability(&self) -> Option<u8> {
        self.find(|block| match block {
            DataBlock::VideoCapability(flags) => Some(*flags),
            _ => None,
        })
    }

    #[must_use]
    pub fn colorimetry(&self) -> Option<[u8; 2]> {
        self.find(|block| match block {
            DataBlock::Colorimetry(colorimetry) => Some(*colorimetry),
            _ => None,
        })
    }

    #[must_use]
    pub fn hdr_static(&self) -> Option<&HdrStaticMetadata> {
        self.find(|block| match block {
            DataBlock::HdrStaticMetadata(hdr) => Some(hdr),
            _ => None,
        })
    }

    #[must_use]
    pub fn hdr_dynamic(&self) -> Option<&[u8]> {
        self.find(|block| match block {
            DataBlock::HdrDynamicMetadata(bytes) => Some(bytes.as_slice()),
            _ => None,
        })
    }

    #[must_use]
    pub fn yuv420_video(&self) -> Option<&[u8]> {
        self.find(|block| match block {
            DataBlock::Yuv420Video(vics) => Some(vics.as_slice()),
            _ => None,
        })
    }

    #[must_use]
    pub fn yuv420_capability_map(&self) -> Option<&[u8]> {
        self.find(|block| match block {
            DataBlock::Yuv420CapabilityMap(map) => Some(map.as_slice()),
            _ => None,
        })
    }
}

/// A validated sink or receiver EDID: base block plus the first CTA-861
/// extension, if any.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CapabilityDescriptor {
    pub base: BaseBlock,
    pub extension: Option<CtaExtension>,
}

impl CapabilityDescriptor {
    /// Parse a raw EDID, one 128-byte block per entry.
    ///
    /// # Errors
    /// - if no blocks are supplied
    /// - if the base block or the CTA extension fails validation
    /// - if extensions are announced but none of them is a CTA extension
    pub fn parse(blocks: &[[u8; BLOCK_SIZE]]) -> Result<Self, Error> {
        let (first, rest) = blocks.split_first().ok_or(Error::Empty)?;
        let base = BaseBlock::parse(first)?;
        let announced = usize::from(base.extension_count());
        if announced == 0 {
            debug!("EDID without extensions, treating sink as DVI");
            return Ok(Self {
                base,
                extension: None,
            });
        }

        let cta = rest
            .iter()
            .take(announced.min(MAX_EXTENSIONS))
            .enumerate()
            .find(|(_, block)| block[0] == CTA_TAG);
        let Some((index, block)) = cta else {
            return Err(Error::MissingExtension);
        };
        let extension = CtaExtension::parse(index as u8 + 1, block)?;
        Ok(Self {
            base,
            extension: Some(extension),
        })
    }

    /// Serialize into 128-byte blocks.
    ///
    /// # Errors
    /// - if the extension does not fit in one block
    pub fn to_blocks(&self) -> Result<Vec<[u8; BLOCK_SIZE]>, Error> {
        let mut blocks = Vec::with_capacity(2);
        match &self.extension {
            Some(extension) => {
                blocks.push(self.base.to_bytes(1));
                blocks.push(extension.to_bytes()?);
            }
            None => blocks.push(self.base.to_bytes(0)),
        }
        Ok(blocks)
    }

    /// Serialize into one contiguous image.
    ///
    /// # Errors
    /// - if the extension does not fit in one block
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.to_blocks()?.concat())
    }

    /// Whether the descriptor carries an HDMI VSDB. Sinks without one are DVI.
    #[must_use]
    pub fn is_hdmi(&self) -> bool {
        self.hdmi_vsdb().is_some()
    }

    #[must_use]
    pub fn hdmi_vsdb(&self) -> Option<&HdmiVsdb> {
        self.extension.as_ref().and_then(CtaExtension::hdmi_vsdb)
    }

    /// The sink's own physical address.
    #[must_use]
    pub fn physical_address(&self) -> Option<PhysicalAddress> {
        self.hdmi_vsdb().map(|vsdb| vsdb.physical_address)
    }
}

/// A serialized EDID prepared for one input port.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdidImage {
    bytes: Vec<u8>,
    /// Offsets of every physical address field in `bytes`.
    address_offsets: heapless::Vec<usize, 4>,
}

impl EdidImage {
    /// Serialize `descriptor` and locate its physical address fields.
    ///
    /// # Errors
    /// - if the descriptor cannot be serialized
    pub fn from_descriptor(descriptor: &CapabilityDescriptor) -> Result<Self, Error> {
        let bytes = descriptor.to_bytes()?;
        let mut address_offsets = heapless::Vec::new();
        if bytes.len() >= 2 * BLOCK_SIZE {
            let extension = &bytes[BLOCK_SIZE..2 * BLOCK_SIZE];
            let dtd_start = usize::from(extension[2]).clamp(CTA_BLOCKS_OFFSET, BLOCK_SIZE);
            for raw in DataBlocks::new(&extension[CTA_BLOCKS_OFFSET..dtd_start]) {
                let raw = raw?;
                if raw.tag == TAG_VENDOR && raw.payload.len() >= 5 && raw.payload[..3] == OUI_HDMI
                {
                    // header byte and OUI precede the address
                    let offset = BLOCK_SIZE + CTA_BLOCKS_OFFSET + raw.offset + 4;
                    if address_offsets.push(offset).is_err() {
                        break;
                    }
                }
            }
        }
        Ok(Self {
            bytes,
            address_offsets,
        })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The physical address stored in the first HDMI VSDB.
    #[must_use]
    pub fn physical_address(&self) -> Option<PhysicalAddress> {
        self.address_offsets
            .first()
            .map(|&offset| {
                PhysicalAddress::from_bytes([self.bytes[offset], self.bytes[offset + 1]])
            })
    }

    /// Rewrite every physical address field and repair the checksums of the
    /// blocks that changed.
    pub fn set_physical_address(&mut self, address: PhysicalAddress) {
        let [hi, lo] = address.to_bytes();
        for offset in &self.address_offsets {
            self.bytes[*offset] = hi;
            self.bytes[offset + 1] = lo;
            let start = offset / BLOCK_SIZE * BLOCK_SIZE;
            let end = start + BLOCK_SIZE;
            self.bytes[end - 1] = block_checksum(&self.bytes[start..end]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edid::checksum::is_block_valid;
    use crate::edid::defaults;

    #[test]
    fn test_builtin_descriptor_round_trips() {
        let builtin = defaults::builtin_descriptor();
        let blocks = builtin.to_blocks().unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|block| is_block_valid(block)));
        assert_eq!(CapabilityDescriptor::parse(&blocks).unwrap(), builtin);
    }

    #[test]
    fn test_parse_rejects_bad_base_block() {
        let mut blocks = defaults::builtin_descriptor().to_blocks().unwrap();
        blocks[0][3] = 0x00;
        assert!(matches!(
            CapabilityDescriptor::parse(&blocks),
            Err(Error::Checksum { block: 0, .. })
        ));
        finalize_checksum(&mut blocks[0]);
        assert_eq!(CapabilityDescriptor::parse(&blocks), Err(Error::InvalidHeader));
        assert_eq!(CapabilityDescriptor::parse(&[]), Err(Error::Empty));
    }

    #[test]
    fn test_parse_rejects_old_revision() {
        let mut blocks = defaults::builtin_descriptor().to_blocks().unwrap();
        blocks[1][1] = 2;
        finalize_checksum(&mut blocks[1]);
        assert_eq!(CapabilityDescriptor::parse(&blocks), Err(Error::UnsupportedRevision(2)));
    }

    #[test]
    fn test_missing_cta_extension() {
        let mut blocks = defaults::builtin_descriptor().to_blocks().unwrap();
        // announced but absent
        assert_eq!(
            CapabilityDescriptor::parse(&blocks[..1]),
            Err(Error::MissingExtension)
        );
        // present but not CTA
        blocks[1][0] = 0xF0;
        assert_eq!(CapabilityDescriptor::parse(&blocks), Err(Error::MissingExtension));
    }

    #[test]
    fn test_dvi_sink_has_no_extension() {
        let base = defaults::builtin_descriptor().base.to_bytes(0);
        let descriptor = CapabilityDescriptor::parse(&[base]).unwrap();
        assert!(descriptor.extension.is_none());
        assert!(!descriptor.is_hdmi());
    }

    #[test]
    fn test_overflowing_extension_is_rejected() {
        let mut extension = defaults::builtin_descriptor().extension.unwrap();
        extension.detailed_timings = vec![[1u8; DESCRIPTOR_SIZE]; 7];
        assert!(matches!(extension.to_bytes(), Err(Error::ExtensionOverflow(_))));
    }

    #[test]
    fn test_image_physical_address_rewrite() {
        let mut image = EdidImage::from_descriptor(&defaults::builtin_descriptor()).unwrap();
        assert_eq!(image.physical_address(), Some(PhysicalAddress::new(0x1000)));
        image.set_physical_address(PhysicalAddress::new(0x2100));
        assert_eq!(image.physical_address(), Some(PhysicalAddress::new(0x2100)));
        let blocks: Vec<[u8; BLOCK_SIZE]> = image
            .as_bytes()
            .chunks_exact(BLOCK_SIZE)
            .map(|chunk| chunk.try_into().unwrap())
            .collect();
        assert!(blocks.iter().all(|block| is_block_valid(block)));
        let reparsed = CapabilityDescriptor::parse(&blocks).unwrap();
        assert_eq!(reparsed.physical_address(), Some(PhysicalAddress::new(0x2100)));
    }
}
