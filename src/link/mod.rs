//! Link acquisition.
//!
//! The [`LinkStateMachine`] turns per-tick [`SignalSample`]s into one of six
//! [`LinkState`]s. It walks forward one state per tick while the signal
//! behaves, and drops back to an earlier state as soon as it does not:
//!
//! ```text
//! NoSignal -> DetectClock -> ResetAnalog -> ResetDigital -> WaitTimingStable -> Stable
//!    ^            ^               ^                               |               |
//!    |            |               +-------------------------------+---------------+
//!    |            +---- clock lost (ResetAnalog .. Stable)
//!    +----------------- power lost or port changed (any state)
//! ```

mod config;
mod machine;
mod sample;

pub use config::LinkConfig;
pub use machine::LinkStateMachine;
pub use sample::{ColorDepth, PixelFormat, SignalSample};

use std::fmt;

/// Acquisition state of the input link.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LinkState {
    /// No +5V on the selected port.
    NoSignal,
    /// Power present, waiting for a steady TMDS clock.
    DetectClock,
    /// Resetting the analog front end (PHY).
    ResetAnalog,
    /// Resetting the digital receive path.
    ResetDigital,
    /// Waiting for sync and a steady timing.
    WaitTimingStable,
    /// Video is flowing.
    Stable,
}

impl LinkState {
    /// Whether `to` is reachable from `self` in a single transition.
    #[must_use]
    pub fn can_transition_to(self, to: LinkState) -> bool {
        use LinkState::*;
        match (self, to) {
            (NoSignal, NoSignal) => false,
            (_, NoSignal) => true,
            (ResetAnalog | ResetDigital | WaitTimingStable | Stable, DetectClock) => true,
            (NoSignal, DetectClock) => true,
            (DetectClock, ResetAnalog) => true,
            (ResetAnalog, ResetDigital) => true,
            (ResetDigital, WaitTimingStable) => true,
            (WaitTimingStable, Stable) => true,
            (WaitTimingStable | Stable, ResetAnalog) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::NoSignal => "NoSignal",
            LinkState::DetectClock => "DetectClock",
            LinkState::ResetAnalog => "ResetAnalog",
            LinkState::ResetDigital => "ResetDigital",
            LinkState::WaitTimingStable => "WaitTimingStable",
            LinkState::Stable => "Stable",
        };
        f.write_str(name)
    }
}

/// Part of the receive path to reset.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ResetKind {
    /// Analog front end (PHY and clock recovery).
    Analog,
    /// Digital decoder and timing detection.
    Digital,
}

/// Why the link machine changed state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TransitionReason {
    PowerDetected,
    PowerLost,
    PortChanged,
    ClockDetected,
    ClockLost,
    ClockChanged,
    AnalogResetDone,
    DigitalResetDone,
    TimingStable,
    ResetTimeout,
    SyncLost,
    PixelClockChanged,
    TimingUnstable,
    IntegrityFault,
}

/// A single state change of the link machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LinkTransition {
    pub from: LinkState,
    pub to: LinkState,
    pub reason: TransitionReason,
}
