use tracing::{debug, info, warn};

use super::{
    Authenticator, DownstreamReport, Hdcp1Authenticator, Hdcp2Authenticator, HdcpConfig,
    HdcpContext, HdcpMode, HdcpReason, HdcpRegisterWrite, HdcpSession, HdcpState,
    HdcpTransition, HdcpVersion, RepeaterTopology, StreamMuteGate, StreamType,
};

/// What changed while the engine handled a tick or an event.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HdcpOutcome {
    pub transitions: heapless::Vec<HdcpTransition, 4>,
    /// New stream mute value, if it changed.
    pub stream_mute: Option<bool>,
    /// The integrity watchdog asked for a link reset.
    pub link_reset: bool,
}

impl HdcpOutcome {
    fn record(&mut self, transition: Option<HdcpTransition>) {
        if let Some(transition) = transition {
            if self.transitions.push(transition).is_err() {
                warn!("Dropping HDCP transition report: {:?}", transition);
            }
        }
    }
}

/// Both authenticators plus the stream mute gate.
#[derive(Debug, Clone)]
pub struct HdcpEngine {
    config: HdcpConfig,
    mode: HdcpMode,
    hdcp1: Hdcp1Authenticator,
    hdcp2: Hdcp2Authenticator,
    gate: StreamMuteGate,
    /// Version of the most recent handshake, which the gate judges.
    active: Option<HdcpVersion>,
}

impl HdcpEngine {
    #[must_use]
    pub fn new(config: HdcpConfig) -> Self {
        Self {
            mode: config.effective_mode(),
            hdcp1: Hdcp1Authenticator::new(config.downstream_wait_ticks),
            hdcp2: Hdcp2Authenticator::new(config.downstream_wait_ticks),
            gate: StreamMuteGate::new(),
            active: None,
            config,
        }
    }

    #[must_use]
    pub fn mode(&self) -> HdcpMode {
        self.mode
    }

    #[must_use]
    pub fn session(&self, version: HdcpVersion) -> HdcpSession {
        match version {
            HdcpVersion::V1 => self.hdcp1.session(),
            HdcpVersion::V2 => self.hdcp2.session(),
        }
    }

    #[must_use]
    pub fn stream_type(&self) -> Option<StreamType> {
        self.gate.stream_type()
    }

    #[must_use]
    pub fn stream_muted(&self) -> bool {
        self.gate.is_muted()
    }

    /// Program the repeater capability bits for the current mode.
    pub fn apply_mode(&mut self, context: &mut HdcpContext<'_>) {
        let enabled = self.mode == HdcpMode::Repeater;
        for version in [HdcpVersion::V1, HdcpVersion::V2] {
            if let Err(err) = context
                .hardware
                .write_hdcp_register(HdcpRegisterWrite::RepeaterMode { version, enabled })
            {
                warn!("Failed to set {} repeater mode: {}", version, err);
            }
        }
    }

    /// Switch between receiver and repeater. A configured forced mode wins
    /// over the request. Running sessions are dropped on an actual change.
    pub fn request_mode(
        &mut self,
        requested: HdcpMode,
        context: &mut HdcpContext<'_>,
    ) -> HdcpOutcome {
        let mode = self.config.forced_mode.unwrap_or(requested);
        if mode != requested {
            info!("HDCP mode {:?} requested, staying in forced {:?}", requested, mode);
        }
        if mode == self.mode {
            return HdcpOutcome::default();
        }
        info!("HDCP mode {:?} -> {:?}", self.mode, mode);
        let outcome = self.reset(HdcpReason::ModeChanged, context);
        self.mode = mode;
        self.apply_mode(context);
        if let Err(err) = context
            .hardware
            .write_hdcp_register(HdcpRegisterWrite::ResetHdcp2)
        {
            warn!("Failed to reset HDCP 2.x engine: {}", err);
        }
        outcome
    }

    /// Handle an authentication-start edge. The caller guarantees a stable link.
    pub fn on_auth_start(
        &mut self,
        version: HdcpVersion,
        context: &mut HdcpContext<'_>,
    ) -> HdcpOutcome {
        let mut outcome = HdcpOutcome::default();
        self.active = Some(version);
        // A new handshake invalidates the previously declared stream type
        self.gate.declare(None);
        let transition = match version {
            HdcpVersion::V1 => self.hdcp1.begin(self.mode, context),
            HdcpVersion::V2 => self.hdcp2.begin(self.mode, context),
        };
        outcome.record(transition);
        self.reevaluate(context, &mut outcome);
        outcome
    }

    /// Advance both authenticators, 1.x first.
    pub fn advance(&mut self, context: &mut HdcpContext<'_>) -> HdcpOutcome {
        let mut outcome = HdcpOutcome::default();
        let authenticators: [&mut dyn Authenticator; 2] = [&mut self.hdcp1, &mut self.hdcp2];
        for authenticator in authenticators {
            let step = authenticator.advance(context);
            outcome.record(step.transition);
            outcome.link_reset |= step.link_reset;
        }
        if !outcome.transitions.is_empty() {
            self.reevaluate(context, &mut outcome);
        }
        outcome
    }

    /// Force both sessions back to `Unauthenticated` and clear the declared
    /// stream type.
    pub fn reset(&mut self, reason: HdcpReason, context: &mut HdcpContext<'_>) -> HdcpOutcome {
        let mut outcome = HdcpOutcome::default();
        let authenticators: [&mut dyn Authenticator; 2] = [&mut self.hdcp1, &mut self.hdcp2];
        for authenticator in authenticators {
            outcome.record(authenticator.reset(reason, context));
        }
        self.active = None;
        self.gate.declare(None);
        self.reevaluate(context, &mut outcome);
        outcome
    }

    /// Record the stream type declared by the source.
    pub fn on_stream_type(
        &mut self,
        stream: Option<StreamType>,
        context: &mut HdcpContext<'_>,
    ) -> HdcpOutcome {
        let mut outcome = HdcpOutcome::default();
        debug!("Stream type declared: {:?}", stream);
        self.gate.declare(stream);
        self.reevaluate(context, &mut outcome);
        outcome
    }

    /// Hand a downstream report to the session of the matching version.
    /// Returns whether a session was waiting for it.
    pub fn on_downstream_report(&mut self, report: &DownstreamReport) -> bool {
        let topology = RepeaterTopology::from_report(report);
        let accepted = match report.version {
            HdcpVersion::V1 => self.hdcp1.accept_topology(&topology),
            HdcpVersion::V2 => self.hdcp2.accept_topology(&topology),
        };
        if accepted {
            debug!(
                "{} downstream topology: {} devices, depth {}",
                report.version, topology.device_count, topology.depth
            );
        } else {
            debug!("{} downstream topology ignored, no session waiting", report.version);
        }
        accepted
    }

    pub fn rearm_integrity_watchdog(&mut self, context: &mut HdcpContext<'_>) {
        self.hdcp2.rearm_watchdog(context);
    }

    fn reevaluate(&mut self, context: &mut HdcpContext<'_>, outcome: &mut HdcpOutcome) {
        let (state, topology) = match self.active {
            Some(HdcpVersion::V1) => (self.hdcp1.state(), self.hdcp1.topology()),
            Some(HdcpVersion::V2) => (self.hdcp2.state(), self.hdcp2.topology()),
            None => (HdcpState::Unauthenticated, None),
        };
        if let Some(muted) = self.gate.evaluate(self.mode, state, topology) {
            if self.mode == HdcpMode::Repeater {
                context.upstream.set_stream_mute(muted);
            }
            outcome.stream_mute = Some(muted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHardware, FakeUpstream};

    struct Rig {
        engine: HdcpEngine,
        hardware: FakeHardware,
        upstream: FakeUpstream,
    }

    impl Rig {
        fn new(mode: HdcpMode) -> Self {
            Self {
                engine: HdcpEngine::new(HdcpConfig::new(mode)),
                hardware: FakeHardware::default(),
                upstream: FakeUpstream::default(),
            }
        }

        fn with<R>(&mut self, f: impl FnOnce(&mut HdcpEngine, &mut HdcpContext<'_>) -> R) -> R {
            let mut context = HdcpContext {
                hardware: &mut self.hardware,
                upstream: &mut self.upstream,
            };
            f(&mut self.engine, &mut context)
        }
    }

    #[test]
    fn test_type1_muted_until_receiver_authenticated() {
        let mut rig = Rig::new(HdcpMode::Receiver);
        rig.with(|engine, context| engine.on_auth_start(HdcpVersion::V2, context));

        let outcome = rig.with(|engine, context| {
            engine.on_stream_type(Some(StreamType::Type1), context)
        });
        assert_eq!(outcome.stream_mute, Some(true));

        rig.hardware.hdcp2.auth_done = true;
        let outcome = rig.with(|engine, context| engine.advance(context));
        assert_eq!(outcome.transitions.len(), 1);
        assert_eq!(outcome.stream_mute, Some(false));
        assert!(!rig.engine.stream_muted());
    }

    #[test]
    fn test_repeater_mute_reaches_upstream() {
        let mut rig = Rig::new(HdcpMode::Repeater);
        rig.with(|engine, context| engine.on_auth_start(HdcpVersion::V1, context));
        rig.with(|engine, context| engine.on_stream_type(Some(StreamType::Type1), context));
        assert_eq!(rig.upstream.stream_mute, Some(true));

        // Link reset clears the stream type and so the mute
        let outcome = rig.with(|engine, context| engine.reset(HdcpReason::LinkReset, context));
        assert_eq!(outcome.stream_mute, Some(false));
        assert_eq!(rig.upstream.stream_mute, Some(false));
        assert_eq!(rig.engine.stream_type(), None);
        assert_eq!(
            rig.engine.session(HdcpVersion::V1).state,
            HdcpState::Unauthenticated
        );
    }

    #[test]
    fn test_forced_mode_wins() {
        let mut config = HdcpConfig::new(HdcpMode::Repeater);
        config.forced_mode = Some(HdcpMode::Receiver);
        let mut rig = Rig::new(HdcpMode::Receiver);
        rig.engine = HdcpEngine::new(config);
        assert_eq!(rig.engine.mode(), HdcpMode::Receiver);

        rig.with(|engine, context| engine.request_mode(HdcpMode::Repeater, context));
        assert_eq!(rig.engine.mode(), HdcpMode::Receiver);
        assert!(rig.hardware.hdcp_writes.is_empty());
    }

    #[test]
    fn test_mode_change_resets_sessions() {
        let mut rig = Rig::new(HdcpMode::Receiver);
        rig.with(|engine, context| engine.on_auth_start(HdcpVersion::V1, context));
        let outcome = rig.with(|engine, context| engine.request_mode(HdcpMode::Repeater, context));

        assert_eq!(outcome.transitions[0].reason, HdcpReason::ModeChanged);
        assert_eq!(rig.engine.mode(), HdcpMode::Repeater);
        assert!(rig.hardware.hdcp_writes.contains(&HdcpRegisterWrite::RepeaterMode {
            version: HdcpVersion::V2,
            enabled: true,
        }));
        assert!(rig.hardware.hdcp_writes.contains(&HdcpRegisterWrite::ResetHdcp2));
    }

    #[test]
    fn test_report_routed_by_version() {
        let mut rig = Rig::new(HdcpMode::Repeater);
        rig.with(|engine, context| engine.on_auth_start(HdcpVersion::V2, context));
        let report = DownstreamReport {
            version: HdcpVersion::V2,
            bstatus: 0,
            bksv: [1, 2, 3, 4, 5],
            ksv_list: heapless::Vec::new(),
            ksv_match: false,
        };
        assert!(rig.engine.on_downstream_report(&report));
        let v1_report = DownstreamReport {
            version: HdcpVersion::V1,
            ..report
        };
        assert!(!rig.engine.on_downstream_report(&v1_report));
        assert_eq!(
            rig.engine
                .session(HdcpVersion::V2)
                .topology
                .map(|t| t.device_count),
            Some(1)
        );
    }
}
