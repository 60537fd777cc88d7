//! Timing thresholds for link acquisition.

/// Thresholds used by the [`LinkStateMachine`](super::LinkStateMachine).
///
/// All durations are in dispatcher ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Largest reference clock difference still considered "unchanged".
    pub clock_tolerance: u32,
    /// Largest horizontal or vertical total difference still considered stable.
    pub timing_tolerance: u16,
    /// Consecutive stable samples required before declaring the link stable.
    pub stable_ticks: u32,
    /// Ticks after the digital reset during which timing is not evaluated.
    pub settle_ticks: u32,
    /// Ticks after the digital reset before giving up and resetting again.
    pub reset_deadline_ticks: u32,
    /// Unstable samples within one window that force a reset of a stable link.
    pub unstable_threshold: u32,
    /// Length of the window in which unstable samples are counted.
    pub unstable_window_ticks: u32,
}

impl LinkConfig {
    /// Create a configuration around the given stable count.
    ///
    /// The reset deadline is derived from it as `stable_ticks * 10 + 300`.
    ///
    /// # Arguments
    /// * `stable_ticks` - Consecutive stable samples required to reach `Stable`
    #[must_use]
    pub fn new(stable_ticks: u32) -> Self {
        Self {
            clock_tolerance: 3,
            timing_tolerance: 5,
            stable_ticks,
            settle_ticks: 8,
            reset_deadline_ticks: stable_ticks * 10 + 300,
            unstable_threshold: 3,
            unstable_window_ticks: 30,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new(20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_follows_stable_ticks() {
        assert_eq!(LinkConfig::default().reset_deadline_ticks, 500);
        assert_eq!(LinkConfig::new(5).reset_deadline_ticks, 350);
    }
}
