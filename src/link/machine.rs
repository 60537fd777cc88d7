use tracing::{debug, info, trace, warn};

use super::{
    LinkConfig, LinkState, LinkTransition, PixelFormat, ResetKind, SignalSample,
    TransitionReason, sample::ClockSnapshot,
};
use crate::{InputPort, traits::Hardware};

/// Counters of one attempt at reaching a stable timing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct StabilityCounters {
    /// Ticks since the digital reset.
    elapsed: u32,
    /// Consecutive samples matching the recorded timing.
    stable: u32,
    h_total: u16,
    v_total: u16,
    format: PixelFormat,
}

impl StabilityCounters {
    fn start(sample: &SignalSample) -> Self {
        let mut counters = Self::default();
        counters.observe(sample);
        counters
    }

    /// Record the sample's timing as the new reference and restart the count.
    fn observe(&mut self, sample: &SignalSample) {
        self.h_total = sample.h_total;
        self.v_total = sample.v_total;
        self.format = sample.format;
        self.stable = 0;
    }
}

/// Instability bookkeeping while the link is stable.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct StableTracking {
    h_total: u16,
    v_total: u16,
    format: PixelFormat,
    /// Unstable samples seen in the current window.
    unstable: u32,
    /// Ticks since the first unstable sample of the current window.
    window: u32,
}

impl StableTracking {
    fn start(counters: &StabilityCounters) -> Self {
        Self {
            h_total: counters.h_total,
            v_total: counters.v_total,
            format: counters.format,
            unstable: 0,
            window: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LinkPhase {
    NoSignal,
    DetectClock { last_clock: Option<u32> },
    ResetAnalog { clock: ClockSnapshot },
    ResetDigital { clock: ClockSnapshot },
    WaitTimingStable { clock: ClockSnapshot, counters: StabilityCounters },
    Stable { clock: ClockSnapshot, tracking: StableTracking },
}

impl LinkPhase {
    fn state(&self) -> LinkState {
        match self {
            LinkPhase::NoSignal => LinkState::NoSignal,
            LinkPhase::DetectClock { .. } => LinkState::DetectClock,
            LinkPhase::ResetAnalog { .. } => LinkState::ResetAnalog,
            LinkPhase::ResetDigital { .. } => LinkState::ResetDigital,
            LinkPhase::WaitTimingStable { .. } => LinkState::WaitTimingStable,
            LinkPhase::Stable { .. } => LinkState::Stable,
        }
    }
}

type Step = Option<(LinkPhase, TransitionReason)>;

/// Link acquisition state machine for one input port.
#[derive(Debug, Clone)]
pub struct LinkStateMachine {
    config: LinkConfig,
    port: InputPort,
    phase: LinkPhase,
}

impl LinkStateMachine {
    #[must_use]
    pub fn new(config: LinkConfig, port: InputPort) -> Self {
        Self {
            config,
            port,
            phase: LinkPhase::NoSignal,
        }
    }

    #[must_use]
    pub fn state(&self) -> LinkState {
        self.phase.state()
    }

    #[must_use]
    pub fn port(&self) -> InputPort {
        self.port
    }

    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Change the port this machine tracks. The next sample reporting a
    /// different active port drops the link to `NoSignal`.
    pub fn select_port(&mut self, port: InputPort) {
        if port != self.port {
            info!("Link now tracking {}", port);
            self.port = port;
        }
    }

    /// Advance by one tick.
    ///
    /// At most one transition happens per call. Resets required by the
    /// current state are issued through `hardware`; a reset that fails keeps
    /// the machine where it is so the reset is retried on the next tick.
    pub fn advance(
        &mut self,
        sample: &SignalSample,
        hardware: &mut dyn Hardware,
    ) -> Option<LinkTransition> {
        trace!(
            "Link sample: 5v={} ckdt={} scdt={} h={} v={} pclk={} ref={}",
            sample.power_detect,
            sample.clock_detect,
            sample.sync_detect,
            sample.h_total,
            sample.v_total,
            sample.pixel_clock,
            sample.reference_clock
        );
        if let Some(transition) = self.on_edge(sample) {
            return Some(transition);
        }

        let step = match self.phase {
            LinkPhase::NoSignal => (sample.power_detect && sample.active_port == self.port)
                .then_some((
                    LinkPhase::DetectClock { last_clock: None },
                    TransitionReason::PowerDetected,
                )),
            LinkPhase::DetectClock { last_clock } => self.detect_clock(last_clock, sample),
            LinkPhase::ResetAnalog { clock } => self.reset_analog(clock, sample, hardware),
            LinkPhase::ResetDigital { clock } => self.reset_digital(clock, sample, hardware),
            LinkPhase::WaitTimingStable { clock, counters } => {
                self.wait_timing_stable(clock, counters, sample)
            }
            LinkPhase::Stable { clock, tracking } => self.track_stable(clock, tracking, sample),
        };
        step.map(|(phase, reason)| self.enter(phase, reason))
    }

    /// Apply only the downgrade checks for an edge-triggered signal change.
    ///
    /// Forward progress always waits for the next tick, so counters are
    /// advanced exactly once per tick.
    pub fn on_edge(&mut self, sample: &SignalSample) -> Option<LinkTransition> {
        let state = self.state();
        if state != LinkState::NoSignal {
            if sample.active_port != self.port {
                return Some(self.enter(LinkPhase::NoSignal, TransitionReason::PortChanged));
            }
            if !sample.power_detect {
                return Some(self.enter(LinkPhase::NoSignal, TransitionReason::PowerLost));
            }
        }
        let clocked = matches!(
            state,
            LinkState::ResetAnalog
                | LinkState::ResetDigital
                | LinkState::WaitTimingStable
                | LinkState::Stable
        );
        if clocked && !sample.clock_detect {
            return Some(self.enter(
                LinkPhase::DetectClock { last_clock: None },
                TransitionReason::ClockLost,
            ));
        }
        if state == LinkState::Stable && !sample.sync_detect {
            return Some(self.enter(
                LinkPhase::ResetAnalog {
                    clock: ClockSnapshot::of(sample),
                },
                TransitionReason::SyncLost,
            ));
        }
        None
    }

    /// Force a stable link back through the analog reset.
    ///
    /// Has no effect unless the link is `Stable`.
    pub fn request_reset(&mut self, reason: TransitionReason) -> Option<LinkTransition> {
        match self.phase {
            LinkPhase::Stable { clock, .. } => {
                Some(self.enter(LinkPhase::ResetAnalog { clock }, reason))
            }
            _ => None,
        }
    }

    fn enter(&mut self, phase: LinkPhase, reason: TransitionReason) -> LinkTransition {
        let from = self.state();
        self.phase = phase;
        let to = self.state();
        info!("Link {}: {} -> {} ({:?})", self.port, from, to, reason);
        LinkTransition { from, to, reason }
    }

    fn detect_clock(&mut self, last_clock: Option<u32>, sample: &SignalSample) -> Step {
        if !sample.clock_detect {
            self.phase = LinkPhase::DetectClock { last_clock: None };
            return None;
        }
        match last_clock {
            Some(previous)
                if previous.abs_diff(sample.reference_clock) <= self.config.clock_tolerance =>
            {
                Some((
                    LinkPhase::ResetAnalog {
                        clock: ClockSnapshot::of(sample),
                    },
                    TransitionReason::ClockDetected,
                ))
            }
            _ => {
                self.phase = LinkPhase::DetectClock {
                    last_clock: Some(sample.reference_clock),
                };
                None
            }
        }
    }

    fn reset_analog(
        &mut self,
        clock: ClockSnapshot,
        sample: &SignalSample,
        hardware: &mut dyn Hardware,
    ) -> Step {
        if let Err(err) = hardware.issue_reset(ResetKind::Analog) {
            warn!("Analog reset failed, retrying next tick: {}", err);
            return None;
        }
        if clock.holds(sample, self.config.clock_tolerance) {
            Some((LinkPhase::ResetDigital { clock }, TransitionReason::AnalogResetDone))
        } else {
            debug!(
                "Reference clock moved during analog reset: {} -> {}",
                clock.reference_clock, sample.reference_clock
            );
            self.phase = LinkPhase::ResetAnalog {
                clock: ClockSnapshot::of(sample),
            };
            None
        }
    }

    fn reset_digital(
        &mut self,
        clock: ClockSnapshot,
        sample: &SignalSample,
        hardware: &mut dyn Hardware,
    ) -> Step {
        if let Err(err) = hardware.issue_reset(ResetKind::Digital) {
            warn!("Digital reset failed, retrying next tick: {}", err);
            return None;
        }
        Some((
            LinkPhase::WaitTimingStable {
                clock,
                counters: StabilityCounters::start(sample),
            },
            TransitionReason::DigitalResetDone,
        ))
    }

    fn wait_timing_stable(
        &mut self,
        clock: ClockSnapshot,
        mut counters: StabilityCounters,
        sample: &SignalSample,
    ) -> Step {
        let reset = |reason| {
            Some((
                LinkPhase::ResetAnalog {
                    clock: ClockSnapshot::of(sample),
                },
                reason,
            ))
        };

        counters.elapsed += 1;
        if counters.elapsed > self.config.reset_deadline_ticks {
            warn!(
                "Timing did not settle within {} ticks",
                self.config.reset_deadline_ticks
            );
            return reset(TransitionReason::ResetTimeout);
        }
        if !clock.holds(sample, self.config.clock_tolerance) {
            return reset(TransitionReason::ClockChanged);
        }

        if counters.elapsed <= self.config.settle_ticks {
            counters.observe(sample);
        } else if sample.pixel_clock_changed {
            if sample.format == counters.format {
                return reset(TransitionReason::PixelClockChanged);
            }
            debug!(
                "Pixel format changed {:?} -> {:?}, restarting timing count",
                counters.format, sample.format
            );
            counters.observe(sample);
        } else if !sample.sync_detect {
            counters.stable = 0;
        } else if !sample.timing_matches(
            counters.h_total,
            counters.v_total,
            self.config.timing_tolerance,
        ) {
            debug!(
                "Timing moved: {}x{} -> {}x{}",
                counters.h_total, counters.v_total, sample.h_total, sample.v_total
            );
            counters.observe(sample);
        } else {
            counters.stable += 1;
            if counters.stable >= self.config.stable_ticks {
                return Some((
                    LinkPhase::Stable {
                        clock,
                        tracking: StableTracking::start(&counters),
                    },
                    TransitionReason::TimingStable,
                ));
            }
        }
        self.phase = LinkPhase::WaitTimingStable { clock, counters };
        None
    }

    fn track_stable(
        &mut self,
        clock: ClockSnapshot,
        mut tracking: StableTracking,
        sample: &SignalSample,
    ) -> Step {
        let reset = |reason| {
            Some((
                LinkPhase::ResetAnalog {
                    clock: ClockSnapshot::of(sample),
                },
                reason,
            ))
        };

        if !clock.holds(sample, self.config.clock_tolerance) {
            return reset(TransitionReason::ClockChanged);
        }
        if sample.pixel_clock_changed {
            if sample.format == tracking.format {
                return reset(TransitionReason::PixelClockChanged);
            }
            debug!(
                "Pixel format changed {:?} -> {:?} on a stable link",
                tracking.format, sample.format
            );
            tracking.format = sample.format;
        }

        if tracking.unstable > 0 {
            tracking.window += 1;
            if tracking.window >= self.config.unstable_window_ticks {
                tracking.window = 0;
                tracking.unstable = 0;
            }
        }
        if !sample.timing_matches(
            tracking.h_total,
            tracking.v_total,
            self.config.timing_tolerance,
        ) {
            // the window opens with the first unstable sample
            if tracking.unstable == 0 {
                tracking.window = 0;
            }
            tracking.unstable += 1;
            debug!(
                "Unstable timing {}x{} (locked {}x{}), count {}",
                sample.h_total,
                sample.v_total,
                tracking.h_total,
                tracking.v_total,
                tracking.unstable
            );
            if tracking.unstable >= self.config.unstable_threshold {
                return reset(TransitionReason::TimingUnstable);
            }
        }
        self.phase = LinkPhase::Stable { clock, tracking };
        None
    }
}
