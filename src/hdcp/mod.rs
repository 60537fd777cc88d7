//! HDCP authentication.
//!
//! Two independent authenticators follow the source's handshake, one per
//! protocol version:
//!
//! ```text
//! HDCP 1.x: Unauthenticated -> Computations -> WaitForDownstream -> WaitVReady -> Authenticated
//! HDCP 2.x: Unauthenticated -> WaitForDownstream -> Authenticated
//! ```
//!
//! In receiver mode the downstream states are skipped. Both authenticators are
//! owned by the [`HdcpEngine`], which also runs the [`StreamMuteGate`] after
//! every change.

mod config;
mod engine;
mod hdcp1;
mod hdcp2;
mod mute;
mod topology;

pub use config::HdcpConfig;
pub use engine::{HdcpEngine, HdcpOutcome};
pub use hdcp1::Hdcp1Authenticator;
pub use hdcp2::Hdcp2Authenticator;
pub use mute::{StreamMuteGate, StreamType};
pub use topology::{DownstreamReport, MAX_KSV_LIST, RepeaterTopology};

use std::fmt;

use crate::traits::{Hardware, Upstream};

/// Key selection vector, also used for HDCP 2.x receiver ids.
pub type Ksv = [u8; 5];

/// HDCP protocol generation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HdcpVersion {
    /// HDCP 1.4 and earlier.
    V1,
    /// HDCP 2.2 and later.
    V2,
}

impl fmt::Display for HdcpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HdcpVersion::V1 => f.write_str("HDCP 1.x"),
            HdcpVersion::V2 => f.write_str("HDCP 2.x"),
        }
    }
}

/// Role the device plays towards the source.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum HdcpMode {
    /// Terminal sink; content is decrypted and consumed here.
    #[default]
    Receiver,
    /// Content is re-encrypted and forwarded downstream.
    Repeater,
}

/// Externally visible authentication state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum HdcpState {
    #[default]
    Unauthenticated,
    /// HDCP 1.x key computations in progress.
    Computations,
    /// Waiting for the downstream side of a repeater to authenticate.
    WaitForDownstream,
    /// HDCP 1.x waiting for the V' ready acknowledgment.
    WaitVReady,
    Authenticated,
}

/// Values exchanged at the start of a handshake.
///
/// For HDCP 1.x these are AKSV, BKSV and An; for HDCP 2.x the transmitter and
/// receiver ids and rtx.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct KeyExchange {
    pub transmitter_id: Ksv,
    pub receiver_id: Ksv,
    pub nonce: [u8; 8],
}

/// Snapshot of the HDCP status registers of one version.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HdcpStatus {
    /// Key computation (1.x) or AKE (2.x) finished.
    pub auth_done: bool,
    /// The receiver is decrypting content.
    pub decrypt_active: bool,
    /// HDCP 1.x V' ready acknowledgment from the downstream side.
    pub ready: bool,
    /// HDCP 2.x ECC out-of-sync detected since the counter was last cleared.
    pub integrity_fault: bool,
    /// HDCP 1.x Ri link verification value.
    pub link_check: u16,
    pub exchange: KeyExchange,
}

/// HDCP register updates the engine performs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HdcpRegisterWrite {
    /// Advertise (or stop advertising) repeater capability for a version.
    RepeaterMode { version: HdcpVersion, enabled: bool },
    /// Latch the HDCP 1.x KSV FIFO ready bit.
    Hdcp1RepeaterReady(bool),
    /// Clear the HDCP 2.x ECC error accumulator and out-of-sync flag.
    ClearIntegrityCounter,
    /// Clear the HDCP 2.x receiver id list.
    ClearReceiverIdList,
    /// Reset the HDCP 2.x engine.
    ResetHdcp2,
}

/// Why an authenticator changed state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HdcpReason {
    AuthenticationStarted,
    ComputationsDone,
    DecryptConfirmed,
    HandshakeDone,
    DownstreamAuthenticated,
    ReadyConfirmed,
    DownstreamTimeout,
    /// The hardware never finished the key computation.
    ComputationsTimeout,
    LinkReset,
    ModeChanged,
}

/// A single state change of one authenticator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HdcpTransition {
    pub version: HdcpVersion,
    pub from: HdcpState,
    pub to: HdcpState,
    pub reason: HdcpReason,
}

/// Public view of one authenticator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HdcpSession {
    pub version: HdcpVersion,
    pub mode: HdcpMode,
    pub state: HdcpState,
    pub exchange: Option<KeyExchange>,
    pub topology: Option<RepeaterTopology>,
}

/// Collaborators an authenticator needs while it runs.
pub struct HdcpContext<'a> {
    pub hardware: &'a mut dyn Hardware,
    pub upstream: &'a mut dyn Upstream,
}

/// Result of one authenticator tick.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AuthStep {
    pub transition: Option<HdcpTransition>,
    /// The integrity watchdog wants the link reset.
    pub link_reset: bool,
}

/// Common interface of the HDCP 1.x and 2.x authenticators.
pub trait Authenticator {
    fn version(&self) -> HdcpVersion;

    fn state(&self) -> HdcpState;

    fn session(&self) -> HdcpSession;

    /// Topology collected for the current repeater session, if any.
    fn topology(&self) -> Option<&RepeaterTopology>;

    /// React to an authentication-start edge from the source.
    fn begin(&mut self, mode: HdcpMode, context: &mut HdcpContext<'_>)
    -> Option<HdcpTransition>;

    /// Advance by one tick. Only called while the link is stable.
    fn advance(&mut self, context: &mut HdcpContext<'_>) -> AuthStep;

    /// Drop the session and return to `Unauthenticated`.
    fn reset(&mut self, reason: HdcpReason, context: &mut HdcpContext<'_>)
    -> Option<HdcpTransition>;

    /// Offer the topology reported by the downstream transmitter.
    /// Returns whether the session took it.
    fn accept_topology(&mut self, topology: &RepeaterTopology) -> bool;
}
