use super::PacketKind;
use crate::InputPort;
use crate::edid::CompositionMode;
use crate::hdcp::{DownstreamReport, HdcpMode, HdcpVersion, StreamType};

/// Edge-triggered hardware signal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SignalEdge {
    /// +5V changed on the active port.
    Power,
    /// TMDS clock detect changed.
    Clock,
    /// Sync detect changed.
    Sync,
    /// The source started an HDCP handshake.
    AuthenticationStart(HdcpVersion),
}

/// Everything the [`Receiver`](super::Receiver) reacts to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// Periodic poll.
    Tick,
    SignalEdge(SignalEdge),
    PacketArrived(PacketKind),
    /// A sink was attached downstream; its EDID can be read.
    CableAttach,
    /// The sink went away; the built-in descriptor is advertised.
    CableDetach,
    /// Content stream type declared by the source. `None` clears it.
    StreamTypeChanged(Option<StreamType>),
    /// Topology reported by the downstream transmitter of a repeater.
    DownstreamTopology(DownstreamReport),
    HdcpModeRequest(HdcpMode),
    EdidModeRequest {
        video: CompositionMode,
        audio: CompositionMode,
    },
    SelectPort(InputPort),
}

impl From<SignalEdge> for Event {
    fn from(edge: SignalEdge) -> Self {
        Event::SignalEdge(edge)
    }
}

impl From<PacketKind> for Event {
    fn from(kind: PacketKind) -> Self {
        Event::PacketArrived(kind)
    }
}
