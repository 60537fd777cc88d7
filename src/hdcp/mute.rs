use tracing::info;

use super::{HdcpMode, HdcpState, RepeaterTopology};

const STREAM_EVENT_MASK: u32 = 0x00FF_FF00;
const STREAM_EVENT_TAG: u32 = 0x0001_0000;

/// HDCP 2.x content stream type declared by the source.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum StreamType {
    /// May be forwarded to any HDCP-protected device.
    #[default]
    Type0,
    /// Must not reach HDCP 1.x devices or HDCP 2.0 repeaters.
    Type1,
}

impl From<u8> for StreamType {
    /// Any non-zero type is handled as Type 1.
    fn from(value: u8) -> Self {
        if value == 0 {
            StreamType::Type0
        } else {
            StreamType::Type1
        }
    }
}

impl StreamType {
    /// Decode a stream-manage event word as delivered by the receiver's
    /// interrupt status: `0x01` in bits 16..24, the type in bits 0..8.
    /// Returns `None` for anything else.
    #[must_use]
    pub fn from_stream_event(raw: u32) -> Option<Self> {
        (raw & STREAM_EVENT_MASK == STREAM_EVENT_TAG).then(|| StreamType::from(raw as u8))
    }
}

/// Mutes the output when the declared stream type is not satisfied by the
/// current authentication.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StreamMuteGate {
    stream: Option<StreamType>,
    muted: bool,
}

impl StreamMuteGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stream_type(&self) -> Option<StreamType> {
        self.stream
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Record the stream type declared by the source. `None` clears it.
    /// Takes effect on the next [`evaluate`](Self::evaluate).
    pub fn declare(&mut self, stream: Option<StreamType>) {
        self.stream = stream;
    }

    /// Decide the mute for the given session. Returns the new mute value if
    /// it changed.
    pub fn evaluate(
        &mut self,
        mode: HdcpMode,
        state: HdcpState,
        topology: Option<&RepeaterTopology>,
    ) -> Option<bool> {
        let muted = requires_mute(self.stream, mode, state, topology);
        if muted == self.muted {
            return None;
        }
        info!(
            "Stream {} (type {:?}, {:?}, {:?})",
            if muted { "muted" } else { "unmuted" },
            self.stream,
            mode,
            state
        );
        self.muted = muted;
        Some(muted)
    }
}

fn requires_mute(
    stream: Option<StreamType>,
    mode: HdcpMode,
    state: HdcpState,
    topology: Option<&RepeaterTopology>,
) -> bool {
    match stream {
        None | Some(StreamType::Type0) => false,
        Some(StreamType::Type1) => {
            let satisfied = state == HdcpState::Authenticated
                && match mode {
                    HdcpMode::Receiver => true,
                    HdcpMode::Repeater => topology.is_some_and(RepeaterTopology::carries_type1),
                };
            !satisfied
        }
    }
}
