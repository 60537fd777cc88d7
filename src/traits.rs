use crate::{
    HardwareError, InputPort, Notification,
    edid::BLOCK_SIZE,
    hdcp::{HdcpRegisterWrite, HdcpStatus, HdcpVersion, RepeaterTopology},
    link::{ResetKind, SignalSample},
};

/// Register level access to the receiver hardware.
///
/// Every method is synchronous and is expected to return within one tick.
/// A method that cannot complete in time should return
/// [`HardwareError::Timeout`]; the engine treats that as "unchanged" and tries
/// again on the next tick.
pub trait Hardware {
    /// Sample the physical layer of the active port.
    /// # Errors
    /// - if the measurement registers cannot be read
    fn read_signal_sample(&mut self) -> Result<SignalSample, HardwareError>;

    /// Reset part of the receive path.
    /// # Errors
    /// - if the reset could not be issued
    fn issue_reset(&mut self, kind: ResetKind) -> Result<(), HardwareError>;

    /// Read one 128 byte block of the attached sink's EDID.
    /// # Errors
    /// - if the sink is absent or the DDC transfer fails
    fn read_capability_block(&mut self, index: u8) -> Result<[u8; BLOCK_SIZE], HardwareError>;

    /// Load a composed EDID image into the port's EDID memory.
    /// # Errors
    /// - if the EDID memory cannot be written
    fn write_capability_descriptor(
        &mut self,
        port: InputPort,
        bytes: &[u8],
    ) -> Result<(), HardwareError>;

    /// Read the HDCP status registers of one protocol version.
    /// # Errors
    /// - if the status registers cannot be read
    fn read_hdcp_register(&mut self, version: HdcpVersion) -> Result<HdcpStatus, HardwareError>;

    /// Apply a single HDCP register update.
    /// # Errors
    /// - if the register cannot be written
    fn write_hdcp_register(&mut self, write: HdcpRegisterWrite) -> Result<(), HardwareError>;

    /// Mute or unmute the audio/video output.
    /// # Errors
    /// - if the mute control cannot be written
    fn set_output_mute(&mut self, muted: bool) -> Result<(), HardwareError>;
}

/// The transmitter side of a repeater.
///
/// Only consulted while HDCP runs in repeater mode. Receiver-only products can
/// use [`NoUpstream`].
pub trait Upstream {
    /// Start authenticating the downstream sink with the given protocol version.
    fn begin_authentication(&mut self, version: HdcpVersion);
    /// Hand the repeater topology to the transmitter so it can be reported
    /// towards the source.
    fn publish_topology(&mut self, version: HdcpVersion, topology: &RepeaterTopology);
    /// Whether the transmitter finished authenticating its downstream sink.
    fn is_upstream_authenticated(&self, version: HdcpVersion) -> bool;
    /// Tell the transmitter the incoming signal went away.
    fn signal_off(&mut self);
    /// Mute or unmute the forwarded stream.
    fn set_stream_mute(&mut self, muted: bool);
}

/// Consumer of engine notifications.
pub trait NotificationSink {
    fn notify(&mut self, notification: Notification);
}

impl NotificationSink for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

/// Upstream stand-in for devices that never act as a repeater.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NoUpstream;

impl Upstream for NoUpstream {
    fn begin_authentication(&mut self, _version: HdcpVersion) {}

    fn publish_topology(&mut self, _version: HdcpVersion, _topology: &RepeaterTopology) {}

    fn is_upstream_authenticated(&self, _version: HdcpVersion) -> bool {
        false
    }

    fn signal_off(&mut self) {}

    fn set_stream_mute(&mut self, _muted: bool) {}
}
