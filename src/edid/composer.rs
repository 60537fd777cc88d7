use tracing::{debug, info, warn};

use super::block::{
    DataBlock, HdmiForumVsdb, HdmiVsdb, HdrStaticMetadata, ShortAudioDescriptor,
    ShortVideoDescriptor,
};
use super::capability::{CapabilitySet, VicSet};
use super::defaults::{self, HARDWARE_CEILING};
use super::descriptor::{BASE_DESCRIPTORS, BaseBlock, CapabilityDescriptor, CtaExtension, EdidImage};
use super::timing::{DESCRIPTOR_SIZE, DUMMY_DESCRIPTOR, DetailedTiming, is_timing};
use super::{BLOCK_SIZE, CompositionMode, EdidConfig, Error, PhysicalAddress};
use crate::InputPort;

const FLAG_UNDERSCAN: u8 = 0x80;
const FLAG_BASIC_AUDIO: u8 = 0x40;
const FLAG_YCBCR: u8 = 0x30;

const VSDB_HDMI_VIDEO_PRESENT: u8 = 0x20;
const VSDB_3D_PRESENT: u8 = 0x80;

/// Sink byte range copied into the base block: basic display parameters and
/// chromaticity.
const DISPLAY_PARAMETERS: std::ops::RangeInclusive<usize> = 0x14..=0x22;

const MAX_SADS: usize = 10;

/// Result of one composition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComposedEdid {
    /// The advertised descriptor, before physical address remapping.
    pub descriptor: CapabilityDescriptor,
    /// Address the per-port addresses are derived from.
    pub upstream_address: PhysicalAddress,
    /// The sink's EDID was unusable and the built-in descriptor is advertised.
    pub fallback: bool,
    images: Vec<(InputPort, EdidImage)>,
}

impl ComposedEdid {
    #[must_use]
    pub fn image(&self, port: InputPort) -> Option<&EdidImage> {
        self.images
            .iter()
            .find(|(candidate, _)| *candidate == port)
            .map(|(_, image)| image)
    }

    #[must_use]
    pub fn images(&self) -> &[(InputPort, EdidImage)] {
        &self.images
    }
}

/// Builds the advertised EDID from the sink's EDID and the receiver's local
/// descriptor.
#[derive(Clone, Debug)]
pub struct EdidComposer {
    config: EdidConfig,
    local: CapabilityDescriptor,
}

impl EdidComposer {
    #[must_use]
    pub fn new(config: EdidConfig) -> Self {
        let local = defaults::local_descriptor(&config);
        Self { config, local }
    }

    /// Use `local` instead of the built-in descriptor.
    #[must_use]
    pub fn with_local(config: EdidConfig, local: CapabilityDescriptor) -> Self {
        Self { config, local }
    }

    #[must_use]
    pub fn config(&self) -> &EdidConfig {
        &self.config
    }

    #[must_use]
    pub fn local(&self) -> &CapabilityDescriptor {
        &self.local
    }

    pub fn set_modes(&mut self, video: CompositionMode, audio: CompositionMode) {
        self.config.video_mode = video;
        self.config.audio_mode = audio;
    }

    /// Compose from raw sink blocks. Never fails: an unusable sink EDID
    /// yields the built-in descriptor.
    #[must_use]
    pub fn compose(&self, blocks: &[[u8; BLOCK_SIZE]]) -> ComposedEdid {
        let sink = match CapabilityDescriptor::parse(blocks) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("Sink EDID rejected ({}), advertising built-in descriptor", e);
                return self.fallback();
            }
        };
        match self.compose_from(&sink) {
            Ok(composed) => composed,
            Err(e) => {
                warn!("Composition failed ({}), advertising built-in descriptor", e);
                self.fallback()
            }
        }
    }

    /// The built-in descriptor, remapped for every port.
    #[must_use]
    pub fn fallback(&self) -> ComposedEdid {
        let descriptor = defaults::builtin_descriptor();
        let parent = self
            .config
            .physical_address_override
            .unwrap_or(PhysicalAddress::ROOT);
        let images = self.images(&descriptor, parent);
        ComposedEdid {
            descriptor,
            upstream_address: parent,
            fallback: true,
            images,
        }
    }

    /// Compose from an already validated sink descriptor.
    ///
    /// # Errors
    /// - if the composed descriptor cannot be serialized
    pub fn compose_from(&self, sink: &CapabilityDescriptor) -> Result<ComposedEdid, Error> {
        let mut extension = self.compose_extension(sink);
        if let Some(extension) = extension.as_mut() {
            fit(extension)?;
        }
        let descriptor = CapabilityDescriptor {
            base: self.compose_base(&sink.base),
            extension,
        };
        // surfaces serialization errors before images are built
        descriptor.to_blocks()?;

        let parent = self
            .config
            .physical_address_override
            .or_else(|| sink.physical_address())
            .unwrap_or(PhysicalAddress::ROOT);
        let images = self.images(&descriptor, parent);
        info!(
            "Composed EDID for {} port(s) below {} ({:?} video, {:?} audio)",
            images.len(),
            parent,
            self.config.video_mode,
            self.config.audio_mode
        );
        Ok(ComposedEdid {
            descriptor,
            upstream_address: parent,
            fallback: false,
            images,
        })
    }

    fn images(
        &self,
        descriptor: &CapabilityDescriptor,
        parent: PhysicalAddress,
    ) -> Vec<(InputPort, EdidImage)> {
        let template = match EdidImage::from_descriptor(descriptor) {
            Ok(image) => image,
            Err(e) => {
                warn!("Cannot serialize advertised EDID: {}", e);
                return Vec::new();
            }
        };
        (0..self.config.port_count.clamp(1, InputPort::MAX))
            .map(InputPort::new)
            .map(|port| {
                let mut image = template.clone();
                let address = parent.child(port.address_nibble());
                image.set_physical_address(address);
                debug!("{} gets physical address {}", port, address);
                (port, image)
            })
            .collect()
    }

    fn compose_base(&self, sink: &BaseBlock) -> BaseBlock {
        let mut base = self.local.base.clone();
        base.copy_range(sink, DISPLAY_PARAMETERS);
        for index in 0..BASE_DESCRIPTORS {
            let descriptor = sink.descriptor(index);
            let kept = if !is_timing(&descriptor) {
                (index != 0).then_some(descriptor)
            } else if self.supported(&descriptor) {
                Some(descriptor)
            } else if index == 0 {
                None
            } else {
                Some(DUMMY_DESCRIPTOR)
            };
            // the preferred timing slot falls back to the local one
            let descriptor = kept.unwrap_or_else(|| self.local.base.descriptor(0));
            base.set_descriptor(index, &descriptor);
        }
        base
    }

    fn supported(&self, descriptor: &[u8; DESCRIPTOR_SIZE]) -> bool {
        DetailedTiming::parse(descriptor)
            .is_some_and(|timing| timing.is_supported(self.config.max_dtd_pixel_clock))
    }

    fn compose_extension(&self, sink: &CapabilityDescriptor) -> Option<CtaExtension> {
        let video_mode = self.config.video_mode;
        let audio_mode = self.config.audio_mode;
        let Some(sink_ext) = sink.extension.as_ref() else {
            // DVI sink
            return match video_mode {
                CompositionMode::Intersect => None,
                CompositionMode::PassThrough => Some(CtaExtension {
                    revision: 3,
                    flags: 0,
                    blocks: vec![DataBlock::HdmiVendor(HdmiVsdb::minimal(PhysicalAddress::ROOT))],
                    detailed_timings: Vec::new(),
                }),
            };
        };
        let empty = CtaExtension {
            revision: 3,
            flags: 0,
            blocks: Vec::new(),
            detailed_timings: Vec::new(),
        };
        let local_ext = self.local.extension.as_ref().unwrap_or(&empty);
        let local_set = CapabilitySet::from_descriptor(&self.local);
        let sink_set = CapabilitySet::from_descriptor(sink);

        let mut blocks = Vec::new();

        let video = compose_video(video_mode, local_ext, sink_ext);
        if !video.is_empty() {
            blocks.push(DataBlock::Video(video.clone()));
        }

        let audio = self.compose_audio(local_ext, sink_ext);
        if !audio.is_empty() {
            blocks.push(DataBlock::Audio(audio));
            let ceiling = match audio_mode {
                CompositionMode::Intersect => local_ext.speaker_allocation(),
                CompositionMode::PassThrough => Some(HARDWARE_CEILING.speakers),
            };
            if let (Some(ceiling), Some(speakers)) = (ceiling, sink_ext.speaker_allocation()) {
                let speakers = and(speakers, ceiling);
                if speakers != [0; 3] {
                    blocks.push(DataBlock::SpeakerAllocation(speakers));
                }
            }
        }

        if let Some(vsdb) = compose_vsdb(video_mode, local_ext, sink_ext) {
            blocks.push(DataBlock::HdmiVendor(vsdb));
            if let Some(forum) = compose_forum_vsdb(video_mode, local_ext, sink_ext) {
                blocks.push(DataBlock::HdmiForumVendor(forum));
            }
        }

        if let Some(flags) = sink_ext.video_capability() {
            blocks.push(DataBlock::VideoCapability(flags));
        }

        let colorimetry_ceiling = match video_mode {
            CompositionMode::Intersect => local_ext.colorimetry(),
            CompositionMode::PassThrough => Some(HARDWARE_CEILING.colorimetry),
        };
        if let (Some(ceiling), Some(colorimetry)) = (colorimetry_ceiling, sink_ext.colorimetry()) {
            let colorimetry = and(colorimetry, ceiling);
            if colorimetry != [0; 2] {
                blocks.push(DataBlock::Colorimetry(colorimetry));
            }
        }

        if let Some(hdr) = compose_hdr(video_mode, local_ext, sink_ext) {
            blocks.push(DataBlock::HdrStaticMetadata(hdr));
        }

        let allowed_420 = match video_mode {
            CompositionMode::Intersect => local_set.yuv420_capable.union(&local_set.yuv420_only),
            CompositionMode::PassThrough => HARDWARE_CEILING.yuv420,
        };
        let advertised: VicSet = video.iter().map(|svd| svd.vic).collect();
        let only_420: heapless::Vec<u8, 30> = sink_ext
            .yuv420_video()
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(|vic| allowed_420.contains(*vic) && !advertised.contains(*vic))
            .collect();
        if !only_420.is_empty() {
            blocks.push(DataBlock::Yuv420Video(only_420));
        }
        let capable = sink_set.yuv420_capable.intersection(&allowed_420);
        if let Some(map) = super::yuv420::capability_map(&video, &capable) {
            blocks.push(DataBlock::Yuv420CapabilityMap(map));
        }

        let dynamic_allowed = video_mode == CompositionMode::PassThrough || local_set.hdr_dynamic;
        if let (true, Some(dynamic)) = (dynamic_allowed, sink_ext.hdr_dynamic()) {
            if let Ok(dynamic) = heapless::Vec::from_slice(dynamic) {
                blocks.push(DataBlock::HdrDynamicMetadata(dynamic));
            }
        }

        let flags = (sink_ext.flags & FLAG_UNDERSCAN)
            | (mode_flags(audio_mode, local_ext.flags, sink_ext.flags) & FLAG_BASIC_AUDIO)
            | (mode_flags(video_mode, local_ext.flags, sink_ext.flags) & FLAG_YCBCR);

        let detailed_timings = sink_ext
            .detailed_timings
            .iter()
            .filter(|descriptor| self.supported(descriptor))
            .copied()
            .collect();

        Some(CtaExtension {
            revision: 3,
            flags,
            blocks,
            detailed_timings,
        })
    }

    fn compose_audio(
        &self,
        local: &CtaExtension,
        sink: &CtaExtension,
    ) -> heapless::Vec<ShortAudioDescriptor, MAX_SADS> {
        let sink_sads = sink.audio().unwrap_or_default();
        let mut composed = heapless::Vec::<ShortAudioDescriptor, MAX_SADS>::new();
        let mut push = |sad: ShortAudioDescriptor| {
            if sad.sample_rates != 0 && !composed.contains(&sad) && composed.push(sad).is_err() {
                debug!("Audio data block full, dropping format {}", sad.format);
            }
        };

        match self.config.audio_mode {
            CompositionMode::Intersect => {
                let local_sads = local.audio().unwrap_or_default();
                for (position, local_sad) in local_sads.iter().enumerate() {
                    // one entry per format, taken from the widest local variant
                    if local_sads[..position]
                        .iter()
                        .any(|earlier| earlier.format == local_sad.format)
                    {
                        continue;
                    }
                    let widest_local = widest(local_sads, local_sad.format).unwrap_or(*local_sad);
                    let Some(sink_sad) = widest(sink_sads, local_sad.format) else {
                        continue;
                    };
                    push(ShortAudioDescriptor {
                        format: sink_sad.format,
                        max_channels: widest_local.max_channels.min(sink_sad.max_channels),
                        sample_rates: widest_local.sample_rates & sink_sad.sample_rates,
                        detail: combine_detail(
                            sink_sad.format,
                            widest_local.detail,
                            sink_sad.detail,
                        ),
                    });
                }
            }
            CompositionMode::PassThrough => {
                let stereo = self.config.stereo_audio_only;
                for sad in sink_sads {
                    let allowed = if stereo {
                        sad.format == super::block::FORMAT_LPCM
                    } else {
                        HARDWARE_CEILING.audio_formats & (1 << (sad.format & 0x0F)) != 0
                    };
                    if !allowed {
                        continue;
                    }
                    let ceiling = if stereo { 2 } else { HARDWARE_CEILING.max_channels };
                    push(ShortAudioDescriptor {
                        max_channels: sad.max_channels.min(ceiling),
                        sample_rates: sad.sample_rates & HARDWARE_CEILING.sample_rates,
                        ..*sad
                    });
                }
            }
        }
        composed
    }
}

/// Drop detailed timings, then data blocks from the end, until the extension
/// fits in one block.
fn fit(extension: &mut CtaExtension) -> Result<(), Error> {
    while extension.encoded_len()? > BLOCK_SIZE - 1 {
        if extension.detailed_timings.pop().is_some() {
            continue;
        }
        match extension.blocks.pop() {
            Some(dropped) => warn!("Advertised EDID too large, dropping {:?}", dropped),
            None => break,
        }
    }
    Ok(())
}

fn widest(sads: &[ShortAudioDescriptor], format: u8) -> Option<ShortAudioDescriptor> {
    sads.iter()
        .filter(|sad| sad.format == format)
        .max_by_key(|sad| sad.max_channels)
        .copied()
}

/// LPCM carries bit depths, formats 2..=8 a maximum bit rate.
fn combine_detail(format: u8, local: u8, sink: u8) -> u8 {
    match format {
        2..=8 => local.min(sink),
        _ => local & sink,
    }
}

fn and<const N: usize>(mut value: [u8; N], mask: [u8; N]) -> [u8; N] {
    for (byte, mask) in value.iter_mut().zip(mask) {
        *byte &= mask;
    }
    value
}

fn mode_flags(mode: CompositionMode, local: u8, sink: u8) -> u8 {
    match mode {
        CompositionMode::Intersect => local & sink,
        CompositionMode::PassThrough => sink,
    }
}

fn compose_video(
    mode: CompositionMode,
    local: &CtaExtension,
    sink: &CtaExtension,
) -> heapless::Vec<ShortVideoDescriptor, 31> {
    let allowed: VicSet = match mode {
        CompositionMode::Intersect => local
            .video()
            .unwrap_or_default()
            .iter()
            .map(|svd| svd.vic)
            .collect(),
        CompositionMode::PassThrough => HARDWARE_CEILING.video,
    };
    let mut seen = VicSet::new();
    let mut video = heapless::Vec::new();
    for svd in sink.video().unwrap_or_default() {
        if !allowed.contains(svd.vic) || seen.contains(svd.vic) {
            continue;
        }
        seen.insert(svd.vic);
        if video.push(*svd).is_err() {
            break;
        }
    }
    video
}

fn compose_vsdb(
    mode: CompositionMode,
    local: &CtaExtension,
    sink: &CtaExtension,
) -> Option<HdmiVsdb> {
    let Some(sink_vsdb) = sink.hdmi_vsdb() else {
        return match mode {
            CompositionMode::Intersect => None,
            CompositionMode::PassThrough => Some(HdmiVsdb::minimal(PhysicalAddress::ROOT)),
        };
    };
    match mode {
        CompositionMode::Intersect => {
            let local_vsdb = local.hdmi_vsdb()?;
            let flags = local_vsdb.flags() & sink_vsdb.flags();
            let tmds = match (local_vsdb.max_tmds_clock(), sink_vsdb.max_tmds_clock()) {
                (Some(local), Some(sink)) => Some(local.min(sink)),
                _ => None,
            };
            let three_d = local_vsdb.three_d_present() && sink_vsdb.three_d_present();
            let fields = [
                flags,
                tmds.unwrap_or(0),
                VSDB_HDMI_VIDEO_PRESENT,
                VSDB_3D_PRESENT,
            ];
            let len = if three_d {
                4
            } else if tmds.is_some() {
                2
            } else {
                1
            };
            let extra = match heapless::Vec::from_slice(&fields[..len]) {
                Ok(extra) => extra,
                Err(_) => {
                    debug!("VSDB fields do not fit, advertising the address only");
                    heapless::Vec::new()
                }
            };
            Some(HdmiVsdb {
                physical_address: sink_vsdb.physical_address,
                extra,
            })
        }
        CompositionMode::PassThrough => {
            let mut vsdb = sink_vsdb.clone();
            if let Some(flags) = vsdb.extra.get_mut(0) {
                *flags &= HARDWARE_CEILING.vsdb_flags;
            }
            if let Some(clock) = vsdb.extra.get_mut(1) {
                if *clock != 0 {
                    *clock = (*clock).min(HARDWARE_CEILING.max_tmds_clock);
                }
            }
            Some(vsdb)
        }
    }
}

fn compose_forum_vsdb(
    mode: CompositionMode,
    local: &CtaExtension,
    sink: &CtaExtension,
) -> Option<HdmiForumVsdb> {
    let sink_forum = sink.hdmi_forum_vsdb()?;
    let mut payload = sink_forum.payload.clone();
    match mode {
        CompositionMode::Intersect => {
            let local_forum = local.hdmi_forum_vsdb()?;
            payload.truncate(local_forum.payload.len());
            for (index, byte) in payload.iter_mut().enumerate() {
                let local_byte = local_forum.payload[index];
                *byte = match index {
                    0 => *byte,
                    1 => (*byte).min(local_byte),
                    _ => *byte & local_byte,
                };
            }
        }
        CompositionMode::PassThrough => {
            if let Some(rate) = payload.get_mut(1) {
                *rate = (*rate).min(HARDWARE_CEILING.max_tmds_rate);
            }
        }
    }
    Some(HdmiForumVsdb { payload })
}

fn compose_hdr(
    mode: CompositionMode,
    local: &CtaExtension,
    sink: &CtaExtension,
) -> Option<HdrStaticMetadata> {
    let sink_hdr = sink.hdr_static()?;
    let (eotf, descriptors) = match mode {
        CompositionMode::Intersect => {
            let local_hdr = local.hdr_static()?;
            (local_hdr.eotf, local_hdr.descriptors)
        }
        CompositionMode::PassThrough => {
            (HARDWARE_CEILING.hdr_eotf, HARDWARE_CEILING.hdr_descriptors)
        }
    };
    let eotf = sink_hdr.eotf & eotf;
    if eotf == 0 {
        return None;
    }
    Some(HdrStaticMetadata {
        eotf,
        descriptors: sink_hdr.descriptors & descriptors,
        luminance: sink_hdr.luminance.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edid::block::FORMAT_LPCM;
    use crate::edid::checksum::{finalize_checksum, is_block_valid};

    /// A 4K television: more formats than the receiver, PA 2.0.0.0.
    fn sink_descriptor() -> CapabilityDescriptor {
        let mut sink = defaults::builtin_descriptor();
        let extension = sink.extension.as_mut().unwrap();
        extension.blocks = vec![
            DataBlock::Video(
                [0x90, 4, 93, 97, 107, 200]
                    .into_iter()
                    .map(ShortVideoDescriptor::from)
                    .collect(),
            ),
            DataBlock::Audio(
                [
                    ShortAudioDescriptor::new(FORMAT_LPCM, 2, 0x07, 0x07),
                    ShortAudioDescriptor::new(2, 6, 0x07, 0x40),
                    ShortAudioDescriptor::new(9, 2, 0x07, 0x00),
                ]
                .into_iter()
                .collect(),
            ),
            DataBlock::SpeakerAllocation([0x0E, 0x00, 0x00]),
            DataBlock::HdmiVendor(HdmiVsdb {
                physical_address: PhysicalAddress::new(0x2000),
                extra: [0x78, 0x78].into_iter().collect(),
            }),
            DataBlock::Colorimetry([0x03, 0x00]),
            DataBlock::Yuv420Video([102, 96].into_iter().collect()),
            DataBlock::Yuv420CapabilityMap([0x08].into_iter().collect()),
        ];
        sink
    }

    fn sink_blocks() -> Vec<[u8; BLOCK_SIZE]> {
        sink_descriptor().to_blocks().unwrap()
    }

    #[test]
    fn test_corrupted_sink_falls_back() {
        let mut blocks = sink_blocks();
        blocks[0][BLOCK_SIZE - 1] ^= 0x01;
        let composed = EdidComposer::new(EdidConfig::default()).compose(&blocks);
        assert!(composed.fallback);
        assert_eq!(composed.descriptor, defaults::builtin_descriptor());
        assert_eq!(composed.upstream_address, PhysicalAddress::ROOT);
    }

    #[test]
    fn test_intersect_is_subset_of_sink() {
        let composer = EdidComposer::new(EdidConfig::default());
        let composed = composer.compose(&sink_blocks());
        assert!(!composed.fallback);
        let sink = CapabilitySet::from_descriptor(&sink_descriptor());
        let local = CapabilitySet::from_descriptor(composer.local());
        let advertised = CapabilitySet::from_descriptor(&composed.descriptor);
        assert!(advertised.is_subset_of(&sink));
        assert!(advertised.is_subset_of(&local));
        assert_eq!(advertised.video.iter().collect::<Vec<_>>(), vec![4, 16, 93, 97]);
        assert!(advertised.native_video.contains(16));
        assert_eq!(advertised.audio_formats, (1 << FORMAT_LPCM) | (1 << 2));
        assert_eq!(advertised.speakers, [0x0E, 0x00, 0x00]);
        assert_eq!(advertised.max_tmds_mhz, 300);
    }

    #[test]
    fn test_bitwise_intersection() {
        let mut local = defaults::builtin_descriptor();
        for block in &mut local.extension.as_mut().unwrap().blocks {
            if let DataBlock::SpeakerAllocation(speakers) = block {
                *speakers = [0b1010, 0, 0];
            }
        }
        let composer = EdidComposer::with_local(EdidConfig::default(), local);
        let mut sink = sink_descriptor();
        for block in &mut sink.extension.as_mut().unwrap().blocks {
            if let DataBlock::SpeakerAllocation(speakers) = block {
                *speakers = [0b1110, 0, 0];
            }
        }
        let composed = composer.compose_from(&sink).unwrap();
        let extension = composed.descriptor.extension.unwrap();
        assert_eq!(extension.speaker_allocation(), Some([0b1010, 0, 0]));
    }

    #[test]
    fn test_vsdb_fields_intersected() {
        let composer = EdidComposer::new(EdidConfig::default());
        let composed = composer.compose_from(&sink_descriptor()).unwrap();
        let extension = composed.descriptor.extension.unwrap();
        let vsdb = extension.hdmi_vsdb().unwrap();
        // flags 0xB8 & 0x78, clock min(0x3C, 0x78), no 3D on the sink
        assert_eq!(vsdb.extra.as_slice(), &[0x38, 0x3C]);
        assert!(!vsdb.three_d_present());

        let composed = composer.compose_from(&defaults::builtin_descriptor()).unwrap();
        let extension = composed.descriptor.extension.unwrap();
        let vsdb = extension.hdmi_vsdb().unwrap();
        assert_eq!(vsdb.extra.as_slice(), &[0xB8, 0x3C, 0x20, 0x80]);
        assert!(vsdb.three_d_present());
    }

    #[test]
    fn test_yuv420_blocks() {
        let composed = EdidComposer::new(EdidConfig::default()).compose(&sink_blocks());
        let extension = composed.descriptor.extension.unwrap();
        // 96 is 4:2:0 only on the sink and locally capable; 102 is not local
        assert_eq!(extension.yuv420_video(), Some(&[96][..]));
        // the sink marks position 3 (VIC 97), which stays at position 3
        assert_eq!(extension.yuv420_capability_map(), Some(&[0x08][..]));
    }

    #[test]
    fn test_pass_through_capped_by_ceiling() {
        let config = EdidConfig::new(CompositionMode::PassThrough, CompositionMode::PassThrough);
        let composed = EdidComposer::new(config).compose(&sink_blocks());
        let advertised = CapabilitySet::from_descriptor(&composed.descriptor);
        // 200 is above the hardware ceiling, 107 is not in the local list
        assert_eq!(advertised.video.iter().collect::<Vec<_>>(), vec![4, 16, 93, 97, 107]);
        // format 9 is outside the ceiling
        assert_eq!(advertised.audio_formats, (1 << FORMAT_LPCM) | (1 << 2));
        let extension = composed.descriptor.extension.unwrap();
        assert_eq!(extension.hdmi_vsdb().unwrap().max_tmds_clock(), Some(0x44));
        assert_eq!(extension.yuv420_video(), Some(&[102, 96][..]));
    }

    #[test]
    fn test_dvi_sink() {
        let dvi = defaults::builtin_descriptor().base.to_bytes(0);
        let intersect = EdidComposer::new(EdidConfig::default()).compose(&[dvi]);
        assert!(intersect.descriptor.extension.is_none());
        assert!(intersect.image(InputPort::new(0)).unwrap().physical_address().is_none());

        let config = EdidConfig::new(CompositionMode::PassThrough, CompositionMode::Intersect);
        let pass = EdidComposer::new(config).compose(&[dvi]);
        assert!(pass.descriptor.is_hdmi());
        let image = pass.image(InputPort::new(0)).unwrap();
        assert_eq!(image.physical_address(), Some(PhysicalAddress::new(0x1000)));
    }

    #[test]
    fn test_per_port_physical_addresses() {
        let config = EdidConfig::default().with_port_count(3);
        let composed = EdidComposer::new(config).compose(&sink_blocks());
        assert_eq!(composed.upstream_address, PhysicalAddress::new(0x2000));
        let addresses: Vec<_> = composed
            .images()
            .iter()
            .map(|(_, image)| image.physical_address().unwrap())
            .collect();
        assert_eq!(
            addresses,
            vec![
                PhysicalAddress::new(0x2100),
                PhysicalAddress::new(0x2200),
                PhysicalAddress::new(0x2300)
            ]
        );
        for (_, image) in composed.images() {
            assert!(image.as_bytes().chunks(BLOCK_SIZE).all(is_block_valid));
        }
    }

    #[test]
    fn test_address_override() {
        let config = EdidConfig::default().with_physical_address(PhysicalAddress::new(0x1230));
        let composed = EdidComposer::new(config).compose(&sink_blocks());
        let image = composed.image(InputPort::new(0)).unwrap();
        assert_eq!(image.physical_address(), Some(PhysicalAddress::new(0x1231)));
    }

    #[test]
    fn test_composition_is_idempotent() {
        let composer = EdidComposer::new(EdidConfig::default().with_port_count(2));
        assert_eq!(composer.compose(&sink_blocks()), composer.compose(&sink_blocks()));
    }

    #[test]
    fn test_unsupported_base_timings_replaced() {
        let mut sink = sink_descriptor();
        let mut uhd = [0u8; DESCRIPTOR_SIZE];
        // 594 MHz 3840x2160
        uhd[..8].copy_from_slice(&[0x08, 0xE8, 0x00, 0x30, 0xF2, 0x70, 0x5A, 0x80]);
        sink.base.set_descriptor(0, &uhd);
        sink.base.set_descriptor(1, &uhd);
        let mut blocks = sink.to_blocks().unwrap();
        finalize_checksum(&mut blocks[0]);
        let composed = EdidComposer::new(EdidConfig::default()).compose(&blocks);
        let base = &composed.descriptor.base;
        assert_eq!(base.descriptor(0), defaults::builtin_descriptor().base.descriptor(0));
        assert_eq!(base.descriptor(1), DUMMY_DESCRIPTOR);
    }
}
