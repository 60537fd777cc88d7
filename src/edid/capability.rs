use std::fmt;

use tracing::debug;

use super::block::FORMAT_LPCM;
use super::descriptor::CapabilityDescriptor;
use super::{PhysicalAddress, yuv420};

/// Set of video identification codes, one bit per VIC.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct VicSet([u64; 4]);

impl VicSet {
    #[must_use]
    pub const fn new() -> Self {
        Self([0; 4])
    }

    #[must_use]
    pub const fn with(mut self, vic: u8) -> Self {
        self.0[(vic / 64) as usize] |= 1 << (vic % 64);
        self
    }

    /// Add every VIC in `first..=last`.
    #[must_use]
    pub const fn with_range(mut self, first: u8, last: u8) -> Self {
        let mut vic = first;
        while vic <= last {
            self = self.with(vic);
            if vic == u8::MAX {
                break;
            }
            vic += 1;
        }
        self
    }

    pub fn insert(&mut self, vic: u8) {
        *self = self.with(vic);
    }

    #[must_use]
    pub const fn contains(&self, vic: u8) -> bool {
        self.0[(vic / 64) as usize] & (1 << (vic % 64)) != 0
    }

    #[must_use]
    pub fn intersection(&self, other: &VicSet) -> VicSet {
        let mut words = self.0;
        for (word, other) in words.iter_mut().zip(other.0) {
            *word &= other;
        }
        VicSet(words)
    }

    #[must_use]
    pub fn union(&self, other: &VicSet) -> VicSet {
        let mut words = self.0;
        for (word, other) in words.iter_mut().zip(other.0) {
            *word |= other;
        }
        VicSet(words)
    }

    #[must_use]
    pub fn is_subset(&self, other: &VicSet) -> bool {
        self.intersection(other) == *self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.iter().map(|word| word.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(|vic| self.contains(*vic))
    }
}

impl FromIterator<u8> for VicSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = VicSet::new();
        for vic in iter {
            set.insert(vic);
        }
        set
    }
}

impl fmt::Debug for VicSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Flattened view of what a descriptor advertises.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CapabilitySet {
    /// An HDMI VSDB is present; DVI otherwise.
    pub hdmi: bool,
    pub physical_address: Option<PhysicalAddress>,
    pub video: VicSet,
    pub native_video: VicSet,
    pub yuv420_only: VicSet,
    pub yuv420_capable: VicSet,
    /// One bit per audio format code.
    pub audio_formats: u16,
    pub pcm_channels: u8,
    pub pcm_sample_rates: u8,
    pub speakers: [u8; 3],
    pub colorimetry: u16,
    pub hdr_eotf: u8,
    pub hdr_dynamic: bool,
    /// Deep colour flags of the HDMI VSDB.
    pub deep_color: u8,
    pub max_tmds_mhz: u16,
    pub three_d: bool,
    pub scdc: bool,
}

impl CapabilitySet {
    #[must_use]
    pub fn from_descriptor(descriptor: &CapabilityDescriptor) -> Self {
        let mut set = CapabilitySet {
            hdmi: descriptor.is_hdmi(),
            physical_address: descriptor.physical_address(),
            ..Default::default()
        };
        let Some(extension) = &descriptor.extension else {
            return set;
        };

        for svd in extension.video().unwrap_or_default() {
            set.video.insert(svd.vic);
            if svd.native {
                set.native_video.insert(svd.vic);
            }
        }
        set.yuv420_only = extension.yuv420_video().unwrap_or_default().iter().copied().collect();
        set.yuv420_capable = yuv420::capable_vics(extension);

        for sad in extension.audio().unwrap_or_default() {
            set.audio_formats |= 1 << (sad.format & 0x0F);
            if sad.format == FORMAT_LPCM {
                set.pcm_channels = set.pcm_channels.max(sad.max_channels);
                set.pcm_sample_rates |= sad.sample_rates;
            }
        }
        set.speakers = extension.speaker_allocation().unwrap_or_default();
        set.colorimetry = u16::from_le_bytes(extension.colorimetry().unwrap_or_default());
        set.hdr_eotf = extension.hdr_static().map_or(0, |hdr| hdr.eotf);
        set.hdr_dynamic = extension.hdr_dynamic().is_some();

        if let Some(vsdb) = extension.hdmi_vsdb() {
            set.deep_color = vsdb.flags() & 0x78;
            set.max_tmds_mhz = vsdb.max_tmds_clock().map_or(0, |clock| u16::from(clock) * 5);
            set.three_d = vsdb.three_d_present();
        }
        if let Some(forum) = extension.hdmi_forum_vsdb() {
            set.max_tmds_mhz = set.max_tmds_mhz.max(u16::from(forum.max_tmds_rate()) * 5);
            set.scdc = forum.scdc_present();
        }
        set
    }

    /// Whether everything this set advertises is also advertised by `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &CapabilitySet) -> bool {
        let bits = |a: u16, b: u16| a & !b == 0;
        let yuv420 = |set: &CapabilitySet| set.yuv420_only.union(&set.yuv420_capable);
        self.video.is_subset(&other.video)
            && yuv420(self).is_subset(&yuv420(other))
            && bits(self.audio_formats, other.audio_formats)
            && self.pcm_channels <= other.pcm_channels
            && bits(self.pcm_sample_rates.into(), other.pcm_sample_rates.into())
            && self
                .speakers
                .iter()
                .zip(other.speakers)
                .all(|(a, b)| bits((*a).into(), b.into()))
            && bits(self.colorimetry, other.colorimetry)
            && bits(self.hdr_eotf.into(), other.hdr_eotf.into())
            && bits(self.deep_color.into(), other.deep_color.into())
    }
}

/// The sink's and the advertised capability sets, versioned.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CapabilityStore {
    sink: Option<CapabilitySet>,
    advertised: CapabilitySet,
    generation: u64,
}

impl CapabilityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both sets. `sink` is `None` when no valid sink EDID is known.
    pub fn update(
        &mut self,
        sink: Option<&CapabilityDescriptor>,
        advertised: &CapabilityDescriptor,
    ) {
        self.sink = sink.map(CapabilitySet::from_descriptor);
        self.advertised = CapabilitySet::from_descriptor(advertised);
        self.generation += 1;
        debug!(
            "Capability store generation {}: {} advertised VICs",
            self.generation,
            self.advertised.video.len()
        );
    }

    #[must_use]
    pub fn sink(&self) -> Option<&CapabilitySet> {
        self.sink.as_ref()
    }

    #[must_use]
    pub fn advertised(&self) -> &CapabilitySet {
        &self.advertised
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
