use crate::InputPort;

/// Colour depth of the incoming video.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ColorDepth {
    #[default]
    Bits8,
    Bits10,
    Bits12,
    Bits16,
}

/// The part of the video format that legitimately changes the pixel clock.
///
/// A pixel clock change that comes with a change of this format is a format
/// switch by the source and does not need a link reset.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct PixelFormat {
    pub yuv420: bool,
    pub depth: ColorDepth,
}

/// One tick's worth of physical layer measurements.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SignalSample {
    /// Port currently routed to the receiver core.
    pub active_port: InputPort,
    /// +5V present on the active port.
    pub power_detect: bool,
    /// TMDS clock detected (CKDT).
    pub clock_detect: bool,
    /// Sync detected (SCDT).
    pub sync_detect: bool,
    /// Measured horizontal total in pixels.
    pub h_total: u16,
    /// Measured vertical total in lines.
    pub v_total: u16,
    /// Measured pixel clock, in the hardware's counter units.
    pub pixel_clock: u32,
    /// Measured TMDS reference clock, in the hardware's counter units.
    pub reference_clock: u32,
    /// Hardware latch reporting a pixel clock change since the last read.
    pub pixel_clock_changed: bool,
    /// TMDS bit clock ratio 1/40 (HDMI 2.0 scrambled rates) is in effect.
    pub clock_ratio_40x: bool,
    pub format: PixelFormat,
}

impl SignalSample {
    /// Whether the two samples' horizontal and vertical totals agree within
    /// `tolerance`.
    #[must_use]
    pub fn timing_matches(&self, h_total: u16, v_total: u16, tolerance: u16) -> bool {
        self.h_total.abs_diff(h_total) <= tolerance && self.v_total.abs_diff(v_total) <= tolerance
    }
}

/// Reference clock and ratio recorded when the analog front end was last reset.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct ClockSnapshot {
    pub(crate) reference_clock: u32,
    pub(crate) ratio_40x: bool,
}

impl ClockSnapshot {
    pub(crate) fn of(sample: &SignalSample) -> Self {
        Self {
            reference_clock: sample.reference_clock,
            ratio_40x: sample.clock_ratio_40x,
        }
    }

    /// Whether the sample still runs on the recorded clock.
    pub(crate) fn holds(&self, sample: &SignalSample, tolerance: u32) -> bool {
        self.ratio_40x == sample.clock_ratio_40x
            && self.reference_clock.abs_diff(sample.reference_clock) <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_matches_within_tolerance() {
        let sample = SignalSample {
            h_total: 2200,
            v_total: 1125,
            ..Default::default()
        };
        assert!(sample.timing_matches(2205, 1120, 5));
        assert!(!sample.timing_matches(2206, 1125, 5));
        assert!(!sample.timing_matches(2200, 1119, 5));
    }

    #[test]
    fn test_clock_snapshot_tracks_ratio() {
        let mut sample = SignalSample {
            reference_clock: 1000,
            ..Default::default()
        };
        let snapshot = ClockSnapshot::of(&sample);
        sample.reference_clock = 1003;
        assert!(snapshot.holds(&sample, 3));
        sample.clock_ratio_40x = true;
        assert!(!snapshot.holds(&sample, 3));
    }
}
