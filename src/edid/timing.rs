/// Size of an 18-byte descriptor in the base block or extension.
pub const DESCRIPTOR_SIZE: usize = 18;

/// Pixel clock ceiling for detailed timings, in units of 10 kHz (222.75 MHz).
pub const DEFAULT_MAX_PIXEL_CLOCK: u16 = 22_275;

/// Placeholder display descriptor (tag 0x10) used where a detailed timing
/// had to be dropped.
pub const DUMMY_DESCRIPTOR: [u8; DESCRIPTOR_SIZE] = {
    let mut dummy = [0u8; DESCRIPTOR_SIZE];
    dummy[3] = 0x10;
    dummy
};

/// Active formats the receiver's video path can process.
const SUPPORTED_ACTIVE: [(u16, u16); 10] = [
    (1920, 1080),
    (1920, 540),
    (1280, 720),
    (720, 480),
    (720, 240),
    (1440, 480),
    (1440, 240),
    (720, 576),
    (1440, 288),
    (640, 480),
];

/// The fields of a detailed timing descriptor the composer cares about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DetailedTiming {
    pub pixel_clock_10khz: u16,
    pub h_active: u16,
    /// Lines per field for interlaced formats.
    pub v_active: u16,
    pub interlaced: bool,
}

impl DetailedTiming {
    /// Decode an 18-byte descriptor. Display descriptors (pixel clock of zero)
    /// yield `None`.
    #[must_use]
    pub fn parse(descriptor: &[u8; DESCRIPTOR_SIZE]) -> Option<Self> {
        let pixel_clock_10khz = u16::from_le_bytes([descriptor[0], descriptor[1]]);
        if pixel_clock_10khz == 0 {
            return None;
        }
        Some(Self {
            pixel_clock_10khz,
            h_active: u16::from(descriptor[2]) | (u16::from(descriptor[4] & 0xF0) << 4),
            v_active: u16::from(descriptor[5]) | (u16::from(descriptor[7] & 0xF0) << 4),
            interlaced: descriptor[17] & 0x80 != 0,
        })
    }

    /// Whether the receiver can pass this timing through.
    #[must_use]
    pub fn is_supported(&self, max_pixel_clock_10khz: u16) -> bool {
        self.pixel_clock_10khz <= max_pixel_clock_10khz
            && SUPPORTED_ACTIVE.contains(&(self.h_active, self.v_active))
    }
}

/// Whether an 18-byte descriptor is a detailed timing rather than a display
/// descriptor.
#[must_use]
pub fn is_timing(descriptor: &[u8; DESCRIPTOR_SIZE]) -> bool {
    descriptor[0] != 0 || descriptor[1] != 0
}
