use super::Timestamp;
use crate::InputPort;
use crate::edid::{CapabilitySet, ComposedEdid};
use crate::hdcp::{HdcpSession, StreamType};
use crate::link::LinkState;

/// Immutable copy of a receiver's externally visible state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortSnapshot {
    pub at: Timestamp,
    pub port: InputPort,
    pub link: LinkState,
    pub hdcp1: HdcpSession,
    pub hdcp2: HdcpSession,
    pub stream_type: Option<StreamType>,
    /// The content stream gate holds the output muted.
    pub stream_muted: bool,
    /// Combined link and stream mute as written to the hardware.
    pub output_muted: bool,
    /// Last composed EDID, absent until the first composition.
    pub composed: Option<ComposedEdid>,
    pub sink: Option<CapabilitySet>,
    pub advertised: CapabilitySet,
    /// Bumped every time the advertised capabilities are recomputed.
    pub capability_generation: u64,
}

impl PortSnapshot {
    #[must_use]
    pub fn is_stable(&self) -> bool {
        self.link == LinkState::Stable
    }
}
