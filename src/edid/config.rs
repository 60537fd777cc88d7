use super::PhysicalAddress;
use super::timing::DEFAULT_MAX_PIXEL_CLOCK;

/// How a capability category of the sink is turned into the advertised one.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum CompositionMode {
    /// Advertise only what both the receiver's local descriptor and the sink
    /// support.
    #[default]
    Intersect,
    /// Advertise what the sink supports, capped by the hardware ceiling.
    PassThrough,
}

/// Configuration for [`super::EdidComposer`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdidConfig {
    pub video_mode: CompositionMode,
    pub audio_mode: CompositionMode,
    /// Number of input ports that receive an image.
    pub port_count: u8,
    /// Parent address used instead of the sink's physical address.
    pub physical_address_override: Option<PhysicalAddress>,
    /// Restrict the local descriptor to two channel LPCM.
    pub stereo_audio_only: bool,
    /// Detailed timings above this pixel clock (10 kHz units) are dropped.
    pub max_dtd_pixel_clock: u16,
}

impl EdidConfig {
    #[must_use]
    pub fn new(video_mode: CompositionMode, audio_mode: CompositionMode) -> Self {
        Self {
            video_mode,
            audio_mode,
            port_count: 1,
            physical_address_override: None,
            stereo_audio_only: false,
            max_dtd_pixel_clock: DEFAULT_MAX_PIXEL_CLOCK,
        }
    }

    #[must_use]
    pub fn with_port_count(mut self, port_count: u8) -> Self {
        self.port_count = port_count;
        self
    }

    #[must_use]
    pub fn with_physical_address(mut self, address: PhysicalAddress) -> Self {
        self.physical_address_override = Some(address);
        self
    }

    #[must_use]
    pub fn with_stereo_audio_only(mut self, stereo: bool) -> Self {
        self.stereo_audio_only = stereo;
        self
    }
}

impl Default for EdidConfig {
    fn default() -> Self {
        Self::new(CompositionMode::Intersect, CompositionMode::Intersect)
    }
}
