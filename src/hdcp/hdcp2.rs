use tracing::{debug, info, warn};

use super::{
    AuthStep, Authenticator, HdcpContext, HdcpMode, HdcpReason, HdcpRegisterWrite, HdcpSession,
    HdcpState, HdcpStatus, HdcpTransition, HdcpVersion, KeyExchange, RepeaterTopology,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Hdcp2Phase {
    /// `start_seen` is set once the source began a handshake, so a receiver
    /// only trusts an `auth_done` that belongs to the current attempt.
    Unauthenticated { start_seen: bool },
    WaitForDownstream { waited: u32 },
    Authenticated,
}

impl Hdcp2Phase {
    fn state(&self) -> HdcpState {
        match self {
            Hdcp2Phase::Unauthenticated { .. } => HdcpState::Unauthenticated,
            Hdcp2Phase::WaitForDownstream { .. } => HdcpState::WaitForDownstream,
            Hdcp2Phase::Authenticated => HdcpState::Authenticated,
        }
    }
}

/// HDCP 2.x authentication, including the link integrity watchdog.
#[derive(Debug, Clone)]
pub struct Hdcp2Authenticator {
    wait_ceiling: u32,
    mode: HdcpMode,
    phase: Hdcp2Phase,
    exchange: Option<KeyExchange>,
    topology: Option<RepeaterTopology>,
}

impl Hdcp2Authenticator {
    /// # Arguments
    /// * `wait_ceiling` - Ticks to wait for the downstream side before giving up
    #[must_use]
    pub fn new(wait_ceiling: u32) -> Self {
        Self {
            wait_ceiling,
            mode: HdcpMode::Receiver,
            phase: Hdcp2Phase::Unauthenticated { start_seen: false },
            exchange: None,
            topology: None,
        }
    }

    /// Clear the ECC error accumulator so that only faults from now on count.
    pub fn rearm_watchdog(&mut self, context: &mut HdcpContext<'_>) {
        write(context, HdcpRegisterWrite::ClearIntegrityCounter);
    }

    fn enter(&mut self, phase: Hdcp2Phase, reason: HdcpReason) -> Option<HdcpTransition> {
        let from = self.phase.state();
        self.phase = phase;
        let to = phase.state();
        if from == to {
            return None;
        }
        info!("HDCP 2.x: {:?} -> {:?} ({:?})", from, to, reason);
        Some(HdcpTransition {
            version: HdcpVersion::V2,
            from,
            to,
            reason,
        })
    }

    fn read_status(context: &mut HdcpContext<'_>) -> Option<HdcpStatus> {
        match context.hardware.read_hdcp_register(HdcpVersion::V2) {
            Ok(status) => Some(status),
            Err(err) => {
                warn!("HDCP 2.x status unavailable: {}", err);
                None
            }
        }
    }
}

fn write(context: &mut HdcpContext<'_>, register: HdcpRegisterWrite) {
    if let Err(err) = context.hardware.write_hdcp_register(register) {
        warn!("HDCP 2.x write {:?} failed: {}", register, err);
    }
}

impl Authenticator for Hdcp2Authenticator {
    fn version(&self) -> HdcpVersion {
        HdcpVersion::V2
    }

    fn state(&self) -> HdcpState {
        self.phase.state()
    }

    fn session(&self) -> HdcpSession {
        HdcpSession {
            version: HdcpVersion::V2,
            mode: self.mode,
            state: self.phase.state(),
            exchange: self.exchange,
            topology: self.topology.clone(),
        }
    }

    fn topology(&self) -> Option<&RepeaterTopology> {
        self.topology.as_ref()
    }

    fn begin(
        &mut self,
        mode: HdcpMode,
        context: &mut HdcpContext<'_>,
    ) -> Option<HdcpTransition> {
        self.mode = mode;
        write(context, HdcpRegisterWrite::ClearIntegrityCounter);
        self.exchange = Self::read_status(context).map(|status| status.exchange);
        if let Some(exchange) = &self.exchange {
            debug!(
                "HDCP 2.x start: transmitter {:02X?} receiver {:02X?} rtx {:02X?}",
                exchange.transmitter_id, exchange.receiver_id, exchange.nonce
            );
        }
        match mode {
            HdcpMode::Repeater => {
                write(context, HdcpRegisterWrite::ClearReceiverIdList);
                self.topology = None;
                context.upstream.begin_authentication(HdcpVersion::V2);
                self.enter(
                    Hdcp2Phase::WaitForDownstream { waited: 0 },
                    HdcpReason::AuthenticationStarted,
                )
            }
            HdcpMode::Receiver => self.enter(
                Hdcp2Phase::Unauthenticated { start_seen: true },
                HdcpReason::AuthenticationStarted,
            ),
        }
    }

    fn advance(&mut self, context: &mut HdcpContext<'_>) -> AuthStep {
        match self.phase {
            Hdcp2Phase::Unauthenticated { start_seen: false } => AuthStep::default(),
            Hdcp2Phase::Unauthenticated { start_seen: true } => {
                let done = self.mode == HdcpMode::Receiver
                    && Self::read_status(context).is_some_and(|status| status.auth_done);
                AuthStep {
                    transition: if done {
                        self.enter(Hdcp2Phase::Authenticated, HdcpReason::HandshakeDone)
                    } else {
                        None
                    },
                    link_reset: false,
                }
            }
            Hdcp2Phase::WaitForDownstream { waited } => {
                let waited = waited + 1;
                let transition = if waited > self.wait_ceiling {
                    warn!(
                        "HDCP 2.x downstream did not authenticate within {} ticks",
                        self.wait_ceiling
                    );
                    self.reset(HdcpReason::DownstreamTimeout, context)
                } else if context.upstream.is_upstream_authenticated(HdcpVersion::V2) {
                    let topology = self
                        .topology
                        .take()
                        .unwrap_or_else(|| RepeaterTopology::empty(HdcpVersion::V2));
                    debug!(
                        "HDCP 2.x publishing topology: {} devices, depth {}, rxinfo 0x{:04X}",
                        topology.device_count,
                        topology.depth,
                        topology.to_bstatus()
                    );
                    context.upstream.publish_topology(HdcpVersion::V2, &topology);
                    self.topology = Some(topology);
                    self.enter(Hdcp2Phase::Authenticated, HdcpReason::DownstreamAuthenticated)
                } else {
                    self.phase = Hdcp2Phase::WaitForDownstream { waited };
                    None
                };
                AuthStep {
                    transition,
                    link_reset: false,
                }
            }
            Hdcp2Phase::Authenticated => {
                let fault = Self::read_status(context)
                    .is_some_and(|status| status.decrypt_active && status.integrity_fault);
                if fault {
                    warn!("HDCP 2.x ECC out of sync, requesting link reset");
                }
                AuthStep {
                    transition: None,
                    link_reset: fault,
                }
            }
        }
    }

    fn reset(
        &mut self,
        reason: HdcpReason,
        _context: &mut HdcpContext<'_>,
    ) -> Option<HdcpTransition> {
        self.exchange = None;
        self.topology = None;
        self.enter(Hdcp2Phase::Unauthenticated { start_seen: false }, reason)
    }

    fn accept_topology(&mut self, topology: &RepeaterTopology) -> bool {
        let waiting = matches!(self.phase, Hdcp2Phase::WaitForDownstream { .. });
        if self.mode != HdcpMode::Repeater || topology.version != HdcpVersion::V2 || !waiting {
            return false;
        }
        self.topology = Some(topology.clone());
        true
    }
}
