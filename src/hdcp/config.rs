use super::HdcpMode;

/// Configuration of the HDCP authenticators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdcpConfig {
    /// Role requested at start-up.
    pub mode: HdcpMode,
    /// Role that overrides any runtime mode request, e.g. a product that must
    /// never act as a repeater.
    pub forced_mode: Option<HdcpMode>,
    /// Ticks a repeater waits for its downstream side before giving up on the
    /// handshake.
    pub downstream_wait_ticks: u32,
}

impl HdcpConfig {
    /// Create a configuration for the given role with the default
    /// downstream wait of 500 ticks.
    #[must_use]
    pub fn new(mode: HdcpMode) -> Self {
        Self {
            mode,
            forced_mode: None,
            downstream_wait_ticks: 500,
        }
    }

    /// Role actually used once the override is applied.
    #[must_use]
    pub fn effective_mode(&self) -> HdcpMode {
        self.forced_mode.unwrap_or(self.mode)
    }
}

impl Default for HdcpConfig {
    fn default() -> Self {
        Self::new(HdcpMode::Receiver)
    }
}
