//! Configuration of the receiver.
//!
//! Every timing threshold is a tick count. The tick period itself only matters
//! to the [`runtime`](crate::runtime) driver and to the wall-clock view of
//! notification timestamps.

use std::time::Duration;

pub use crate::edid::{CompositionMode, EdidConfig};
pub use crate::hdcp::HdcpConfig;
pub use crate::link::LinkConfig;
use crate::{DEFAULT_TICK_MS, InputPort};

/// Configuration for one [`Receiver`](crate::Receiver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Input port the link machine tracks at start-up.
    pub port: InputPort,
    pub tick_period: Duration,
    /// Ticks a packet kind may stay silent before a timeout is reported.
    pub packet_timeout_ticks: u32,
    pub link: LinkConfig,
    pub hdcp: HdcpConfig,
    pub edid: EdidConfig,
}

impl ReceiverConfig {
    /// Create a configuration for `port` with the default thresholds.
    #[must_use]
    pub fn new(port: InputPort) -> Self {
        Self {
            port,
            tick_period: Duration::from_millis(DEFAULT_TICK_MS),
            packet_timeout_ticks: 50,
            link: LinkConfig::default(),
            hdcp: HdcpConfig::default(),
            edid: EdidConfig::default(),
        }
    }

    #[must_use]
    pub fn with_hdcp(mut self, hdcp: HdcpConfig) -> Self {
        self.hdcp = hdcp;
        self
    }

    #[must_use]
    pub fn with_edid(mut self, edid: EdidConfig) -> Self {
        self.edid = edid;
        self
    }

    #[must_use]
    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.link = link;
        self
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self::new(InputPort::default())
    }
}
