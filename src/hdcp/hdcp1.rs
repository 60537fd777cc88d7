use tracing::{debug, info, trace, warn};

use super::{
    AuthStep, Authenticator, HdcpContext, HdcpMode, HdcpReason, HdcpRegisterWrite, HdcpSession,
    HdcpState, HdcpStatus, HdcpTransition, HdcpVersion, KeyExchange, RepeaterTopology,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Hdcp1Phase {
    Unauthenticated,
    Computations { waited: u32 },
    WaitForDownstream { waited: u32 },
    WaitVReady { waited: u32 },
    Authenticated { link_check: u16 },
}

impl Hdcp1Phase {
    fn state(&self) -> HdcpState {
        match self {
            Hdcp1Phase::Unauthenticated => HdcpState::Unauthenticated,
            Hdcp1Phase::Computations { .. } => HdcpState::Computations,
            Hdcp1Phase::WaitForDownstream { .. } => HdcpState::WaitForDownstream,
            Hdcp1Phase::WaitVReady { .. } => HdcpState::WaitVReady,
            Hdcp1Phase::Authenticated { .. } => HdcpState::Authenticated,
        }
    }
}

/// HDCP 1.x authentication as seen from the receiver side.
///
/// The cipher itself runs in hardware. This type only follows the handshake,
/// waits for the downstream side when acting as a repeater and keeps the
/// values needed to report the session.
#[derive(Debug, Clone)]
pub struct Hdcp1Authenticator {
    wait_ceiling: u32,
    mode: HdcpMode,
    phase: Hdcp1Phase,
    exchange: Option<KeyExchange>,
    topology: Option<RepeaterTopology>,
}

impl Hdcp1Authenticator {
    /// # Arguments
    /// * `wait_ceiling` - Ticks to wait for the downstream side before giving up
    #[must_use]
    pub fn new(wait_ceiling: u32) -> Self {
        Self {
            wait_ceiling,
            mode: HdcpMode::Receiver,
            phase: Hdcp1Phase::Unauthenticated,
            exchange: None,
            topology: None,
        }
    }

    fn enter(&mut self, phase: Hdcp1Phase, reason: HdcpReason) -> Option<HdcpTransition> {
        let from = self.phase.state();
        self.phase = phase;
        let to = phase.state();
        if from == to {
            return None;
        }
        info!("HDCP 1.x: {:?} -> {:?} ({:?})", from, to, reason);
        Some(HdcpTransition {
            version: HdcpVersion::V1,
            from,
            to,
            reason,
        })
    }

    fn read_status(context: &mut HdcpContext<'_>) -> Option<HdcpStatus> {
        match context.hardware.read_hdcp_register(HdcpVersion::V1) {
            Ok(status) => Some(status),
            Err(err) => {
                warn!("HDCP 1.x status unavailable: {}", err);
                None
            }
        }
    }

    fn give_up(&mut self, context: &mut HdcpContext<'_>) -> Option<HdcpTransition> {
        warn!(
            "HDCP 1.x downstream did not authenticate within {} ticks",
            self.wait_ceiling
        );
        self.reset(HdcpReason::DownstreamTimeout, context)
    }
}

impl Authenticator for Hdcp1Authenticator {
    fn version(&self) -> HdcpVersion {
        HdcpVersion::V1
    }

    fn state(&self) -> HdcpState {
        self.phase.state()
    }

    fn session(&self) -> HdcpSession {
        HdcpSession {
            version: HdcpVersion::V1,
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
        self.exchange = Self::read_status(context).map(|status| status.exchange);
        if let Some(exchange) = &self.exchange {
            debug!(
                "HDCP 1.x start: AKSV {:02X?} BKSV {:02X?} An {:02X?}",
                exchange.transmitter_id, exchange.receiver_id, exchange.nonce
            );
        }
        if mode == HdcpMode::Repeater {
            self.topology = None;
            context.upstream.begin_authentication(HdcpVersion::V1);
        }
        self.enter(
            Hdcp1Phase::Computations { waited: 0 },
            HdcpReason::AuthenticationStarted,
        )
    }

    fn advance(&mut self, context: &mut HdcpContext<'_>) -> AuthStep {
        let transition = match self.phase {
            Hdcp1Phase::Unauthenticated => None,
            Hdcp1Phase::Computations { waited } => {
                let waited = waited + 1;
                match Self::read_status(context) {
                    Some(status) if self.mode == HdcpMode::Repeater && status.auth_done => self
                        .enter(
                            Hdcp1Phase::WaitForDownstream { waited: 0 },
                            HdcpReason::ComputationsDone,
                        ),
                    Some(status) if self.mode == HdcpMode::Receiver && status.decrypt_active => {
                        self.enter(
                            Hdcp1Phase::Authenticated {
                                link_check: status.link_check,
                            },
                            HdcpReason::DecryptConfirmed,
                        )
                    }
                    _ if waited > self.wait_ceiling => {
                        warn!(
                            "HDCP 1.x computations not done within {} ticks",
                            self.wait_ceiling
                        );
                        self.reset(HdcpReason::ComputationsTimeout, context)
                    }
                    _ => {
                        self.phase = Hdcp1Phase::Computations { waited };
                        None
                    }
                }
            }
            Hdcp1Phase::WaitForDownstream { waited } => {
                let waited = waited + 1;
                if waited > self.wait_ceiling {
                    self.give_up(context)
                } else if context.upstream.is_upstream_authenticated(HdcpVersion::V1) {
                    let topology = self
                        .topology
                        .take()
                        .unwrap_or_else(|| RepeaterTopology::empty(HdcpVersion::V1));
                    debug!(
                        "HDCP 1.x publishing topology: {} devices, depth {}",
                        topology.device_count, topology.depth
                    );
                    context.upstream.publish_topology(HdcpVersion::V1, &topology);
                    self.topology = Some(topology);
                    self.enter(
                        Hdcp1Phase::WaitVReady { waited },
                        HdcpReason::DownstreamAuthenticated,
                    )
                } else {
                    self.phase = Hdcp1Phase::WaitForDownstream { waited };
                    None
                }
            }
            Hdcp1Phase::WaitVReady { waited } => {
                let waited = waited + 1;
                if waited > self.wait_ceiling {
                    self.give_up(context)
                } else {
                    match Self::read_status(context) {
                        Some(status) if status.ready => {
                            let matched = self.topology.as_ref().is_some_and(|t| t.ksv_match);
                            if matched {
                                let ready = HdcpRegisterWrite::Hdcp1RepeaterReady(true);
                                if let Err(err) = context.hardware.write_hdcp_register(ready) {
                                    warn!("Failed to latch HDCP 1.x ready: {}", err);
                                }
                            }
                            self.enter(
                                Hdcp1Phase::Authenticated {
                                    link_check: status.link_check,
                                },
                                HdcpReason::ReadyConfirmed,
                            )
                        }
                        _ => {
                            self.phase = Hdcp1Phase::WaitVReady { waited };
                            None
                        }
                    }
                }
            }
            Hdcp1Phase::Authenticated { link_check } => {
                if let Some(status) = Self::read_status(context) {
                    if status.link_check != link_check {
                        trace!("HDCP 1.x Ri 0x{:04X} -> 0x{:04X}", link_check, status.link_check);
                        self.phase = Hdcp1Phase::Authenticated {
                            link_check: status.link_check,
                        };
                    }
                }
                None
            }
        };
        AuthStep {
            transition,
            link_reset: false,
        }
    }

    fn reset(
        &mut self,
        reason: HdcpReason,
        context: &mut HdcpContext<'_>,
    ) -> Option<HdcpTransition> {
        self.exchange = None;
        self.topology = None;
        if self.phase == Hdcp1Phase::Unauthenticated {
            return None;
        }
        if self.mode == HdcpMode::Repeater {
            if let Err(err) = context
                .hardware
                .write_hdcp_register(HdcpRegisterWrite::Hdcp1RepeaterReady(false))
            {
                warn!("Failed to clear HDCP 1.x ready: {}", err);
            }
        }
        self.enter(Hdcp1Phase::Unauthenticated, reason)
    }

    fn accept_topology(&mut self, topology: &RepeaterTopology) -> bool {
        let waiting = matches!(
            self.phase,
            Hdcp1Phase::Computations { .. } | Hdcp1Phase::WaitForDownstream { .. }
        );
        if self.mode != HdcpMode::Repeater || topology.version != HdcpVersion::V1 || !waiting {
            return false;
        }
        self.topology = Some(topology.clone());
        true
    }
}
