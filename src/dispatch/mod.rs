//! The single entry point that drives every component.
//!
//! [`Receiver::handle`] takes one [`Event`] at a time. A [`Event::Tick`] runs
//! the stages in [`DISPATCH_ORDER`]: the link machine first, then both HDCP
//! authenticators (only on a stable link), then the packet trackers. Side
//! effects of link transitions (HDCP resets, muting, EDID reloads) are applied
//! here so the components stay unaware of each other.

mod event;
mod notification;
mod packet;
mod snapshot;

pub use event::{Event, SignalEdge};
pub use notification::{Notification, NotificationEvent, NotificationKind, Timestamp};
pub use packet::{PacketKind, PacketTracker};
pub use snapshot::PortSnapshot;

use tracing::{debug, info, warn};

use crate::config::ReceiverConfig;
use crate::edid::{
    BLOCK_SIZE, CapabilityDescriptor, CapabilityStore, ComposedEdid, EdidComposer,
    MAX_EXTENSIONS,
};
use crate::hdcp::{HdcpContext, HdcpEngine, HdcpMode, HdcpOutcome, HdcpReason, HdcpVersion};
use crate::link::{LinkState, LinkStateMachine, LinkTransition, TransitionReason};
use crate::traits::{Hardware, NotificationSink, Upstream};

/// Offset of the extension count in the EDID base block.
const EXTENSION_COUNT_OFFSET: usize = 0x7E;

/// One step of a tick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Stage {
    Link,
    Hdcp,
    Packets,
}

/// Order in which a tick advances the components.
const DISPATCH_ORDER: [Stage; 3] = [Stage::Link, Stage::Hdcp, Stage::Packets];

/// Everything owned on behalf of one input port.
#[derive(Debug)]
struct PortState {
    now: Timestamp,
    link: LinkStateMachine,
    hdcp: HdcpEngine,
    packets: PacketTracker,
    capabilities: CapabilityStore,
    composer: EdidComposer,
    composed: Option<ComposedEdid>,
    /// A sink is attached and its EDID should be read.
    sink_attached: bool,
    /// A capability change arrived while the composer was not allowed to run.
    capability_change_pending: bool,
    /// The link side of the output mute.
    link_muted: bool,
    /// Last value written to the hardware.
    output_muted: Option<bool>,
}

impl PortState {
    fn new(config: &ReceiverConfig) -> Self {
        Self {
            now: Timestamp::default(),
            link: LinkStateMachine::new(config.link.clone(), config.port),
            hdcp: HdcpEngine::new(config.hdcp.clone()),
            packets: PacketTracker::new(config.packet_timeout_ticks),
            capabilities: CapabilityStore::new(),
            composer: EdidComposer::new(config.edid.clone()),
            composed: None,
            sink_attached: false,
            capability_change_pending: false,
            link_muted: true,
            output_muted: None,
        }
    }
}

/// HDMI receiver protocol engine for one input.
///
/// Owns the collaborators it talks to. All state changes happen inside
/// [`Receiver::handle`]; nothing runs in the background.
#[derive(Debug)]
pub struct Receiver<H, U, N> {
    config: ReceiverConfig,
    hardware: H,
    upstream: U,
    notifications: N,
    state: PortState,
}

impl<H, U, N> Receiver<H, U, N>
where
    H: Hardware,
    U: Upstream,
    N: NotificationSink,
{
    /// Create a receiver, program the HDCP role and load the built-in EDID.
    pub fn new(config: ReceiverConfig, hardware: H, upstream: U, notifications: N) -> Self {
        let state = PortState::new(&config);
        let mut receiver = Self {
            config,
            hardware,
            upstream,
            notifications,
            state,
        };
        receiver.with_hdcp(|hdcp, context| hdcp.apply_mode(context));
        receiver.apply_output_mute();
        receiver.recompose();
        receiver
    }

    #[must_use]
    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.state.now
    }

    #[must_use]
    pub fn link_state(&self) -> LinkState {
        self.state.link.state()
    }

    #[must_use]
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    #[must_use]
    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    pub fn upstream_mut(&mut self) -> &mut U {
        &mut self.upstream
    }

    #[must_use]
    pub fn notifications(&self) -> &N {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut N {
        &mut self.notifications
    }

    /// Handle one event. Never fails: collaborator errors are logged and the
    /// affected step is retried on a later tick.
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Tick => self.tick(),
            Event::SignalEdge(edge) => self.on_signal_edge(edge),
            Event::PacketArrived(kind) => self.state.packets.on_arrival(kind, self.state.now),
            Event::CableAttach => {
                info!("Sink attached");
                self.state.sink_attached = true;
                self.capability_changed();
            }
            Event::CableDetach => {
                info!("Sink detached");
                self.state.sink_attached = false;
                self.capability_changed();
            }
            Event::StreamTypeChanged(stream) => {
                let outcome = self.with_hdcp(|hdcp, context| hdcp.on_stream_type(stream, context));
                self.apply_hdcp_outcome(outcome);
            }
            Event::DownstreamTopology(report) => {
                self.state.hdcp.on_downstream_report(&report);
            }
            Event::HdcpModeRequest(mode) => {
                let outcome = self.with_hdcp(|hdcp, context| hdcp.request_mode(mode, context));
                self.apply_hdcp_outcome(outcome);
            }
            Event::EdidModeRequest { video, audio } => {
                info!("EDID composition video {:?}, audio {:?}", video, audio);
                self.state.composer.set_modes(video, audio);
                self.capability_changed();
            }
            Event::SelectPort(port) => {
                self.config.port = port;
                self.state.link.select_port(port);
            }
        }
    }

    /// Immutable copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> PortSnapshot {
        let hdcp = &self.state.hdcp;
        PortSnapshot {
            at: self.state.now,
            port: self.state.link.port(),
            link: self.state.link.state(),
            hdcp1: hdcp.session(HdcpVersion::V1),
            hdcp2: hdcp.session(HdcpVersion::V2),
            stream_type: hdcp.stream_type(),
            stream_muted: hdcp.stream_muted(),
            output_muted: self.state.link_muted || hdcp.stream_muted(),
            composed: self.state.composed.clone(),
            sink: self.state.capabilities.sink().cloned(),
            advertised: self.state.capabilities.advertised().clone(),
            capability_generation: self.state.capabilities.generation(),
        }
    }

    fn tick(&mut self) {
        self.state.now = self.state.now.next();
        for stage in DISPATCH_ORDER {
            match stage {
                Stage::Link => self.advance_link(),
                Stage::Hdcp => self.advance_hdcp(),
                Stage::Packets => self.poll_packets(),
            }
        }
    }

    fn advance_link(&mut self) {
        let sample = match self.hardware.read_signal_sample() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Signal sample unavailable ({}), link unchanged this tick", e);
                return;
            }
        };
        if let Some(transition) = self.state.link.advance(&sample, &mut self.hardware) {
            self.on_link_transition(transition);
        }
    }

    fn advance_hdcp(&mut self) {
        if self.state.link.state() != LinkState::Stable {
            return;
        }
        let outcome = self.with_hdcp(|hdcp, context| hdcp.advance(context));
        let link_reset = outcome.link_reset;
        self.apply_hdcp_outcome(outcome);
        if link_reset {
            warn!("HDCP 2.x integrity fault, resetting link");
            let transition = self.state.link.request_reset(TransitionReason::IntegrityFault);
            if let Some(transition) = transition {
                self.on_link_transition(transition);
            }
        }
    }

    fn poll_packets(&mut self) {
        for kind in self.state.packets.poll(self.state.now) {
            warn!("No {:?} packet for {} ticks", kind, self.config.packet_timeout_ticks);
            self.notify(NotificationEvent::PacketTimeout(kind));
        }
    }

    fn on_signal_edge(&mut self, edge: SignalEdge) {
        match edge {
            SignalEdge::AuthenticationStart(version) => {
                if self.state.link.state() != LinkState::Stable {
                    warn!(
                        "{} authentication start dropped, link is {}",
                        version,
                        self.state.link.state()
                    );
                    return;
                }
                let outcome = self.with_hdcp(|hdcp, context| hdcp.on_auth_start(version, context));
                self.apply_hdcp_outcome(outcome);
            }
            SignalEdge::Power | SignalEdge::Clock | SignalEdge::Sync => {
                let sample = match self.hardware.read_signal_sample() {
                    Ok(sample) => sample,
                    Err(e) => {
                        warn!("Signal sample unavailable on {:?} edge: {}", edge, e);
                        return;
                    }
                };
                if let Some(transition) = self.state.link.on_edge(&sample) {
                    self.on_link_transition(transition);
                }
            }
        }
    }

    /// Apply the entry effects of the state the link just entered.
    fn on_link_transition(&mut self, transition: LinkTransition) {
        self.notify(NotificationEvent::LinkStateChanged {
            from: transition.from,
            to: transition.to,
            reason: transition.reason,
        });
        match transition.to {
            LinkState::NoSignal | LinkState::DetectClock | LinkState::ResetAnalog => {
                self.state.link_muted = true;
                self.state.packets.disarm();
                let outcome =
                    self.with_hdcp(|hdcp, context| hdcp.reset(HdcpReason::LinkReset, context));
                self.apply_hdcp_outcome(outcome);
                if self.state.hdcp.mode() == HdcpMode::Repeater {
                    self.upstream.signal_off();
                }
            }
            LinkState::Stable => {
                self.state.link_muted = false;
                self.state.packets.rearm();
                self.with_hdcp(|hdcp, context| hdcp.rearm_integrity_watchdog(context));
            }
            LinkState::ResetDigital | LinkState::WaitTimingStable => {}
        }
        self.apply_output_mute();
        if matches!(transition.to, LinkState::Stable | LinkState::NoSignal)
            && self.state.capability_change_pending
        {
            debug!("Servicing latched capability change");
            self.state.capability_change_pending = false;
            self.recompose();
        }
    }

    /// Recompose now if allowed, otherwise latch the change.
    fn capability_changed(&mut self) {
        match self.state.link.state() {
            LinkState::Stable | LinkState::NoSignal => self.recompose(),
            state => {
                debug!("Capability change latched while link is {}", state);
                self.state.capability_change_pending = true;
            }
        }
    }

    fn recompose(&mut self) {
        let (composed, sink) = if self.state.sink_attached {
            let blocks = self.read_sink_blocks();
            match CapabilityDescriptor::parse(&blocks) {
                Ok(sink) => match self.state.composer.compose_from(&sink) {
                    Ok(composed) => (composed, Some(sink)),
                    Err(e) => {
                        warn!("Composition failed ({}), advertising built-in descriptor", e);
                        (self.state.composer.fallback(), None)
                    }
                },
                Err(e) => {
                    warn!("Sink EDID rejected ({}), advertising built-in descriptor", e);
                    (self.state.composer.fallback(), None)
                }
            }
        } else {
            (self.state.composer.fallback(), None)
        };

        for (port, image) in composed.images() {
            if let Err(e) = self.hardware.write_capability_descriptor(*port, image.as_bytes()) {
                warn!("Failed to load EDID into {}: {}", port, e);
            }
        }
        self.state
            .capabilities
            .update(sink.as_ref(), &composed.descriptor);
        info!(
            "EDID updated: {} port(s) below {}{}",
            composed.images().len(),
            composed.upstream_address,
            if composed.fallback { ", built-in" } else { "" }
        );
        self.notify(NotificationEvent::CapabilityDescriptorUpdated {
            fallback: composed.fallback,
            physical_address: composed.upstream_address,
            ports: composed.images().len() as u8,
        });
        self.state.composed = Some(composed);
    }

    /// Read the base block and as many extensions as it announces. A failed
    /// read ends the list early, which the parser then rejects.
    fn read_sink_blocks(&mut self) -> Vec<[u8; BLOCK_SIZE]> {
        let base = match self.hardware.read_capability_block(0) {
            Ok(block) => block,
            Err(e) => {
                warn!("Sink EDID unreadable: {}", e);
                return Vec::new();
            }
        };
        let extensions = usize::from(base[EXTENSION_COUNT_OFFSET]).min(MAX_EXTENSIONS);
        let mut blocks = Vec::with_capacity(1 + extensions);
        blocks.push(base);
        for index in 1..=extensions as u8 {
            match self.hardware.read_capability_block(index) {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    warn!("Sink EDID block {} unreadable: {}", index, e);
                    break;
                }
            }
        }
        blocks
    }

    fn apply_hdcp_outcome(&mut self, outcome: HdcpOutcome) {
        for transition in &outcome.transitions {
            self.notify(NotificationEvent::HdcpStateChanged {
                version: transition.version,
                from: transition.from,
                to: transition.to,
                reason: transition.reason,
            });
        }
        if let Some(muted) = outcome.stream_mute {
            self.notify(NotificationEvent::StreamMuteChanged { muted });
            self.apply_output_mute();
        }
    }

    fn apply_output_mute(&mut self) {
        let muted = self.state.link_muted || self.state.hdcp.stream_muted();
        if self.state.output_muted == Some(muted) {
            return;
        }
        match self.hardware.set_output_mute(muted) {
            Ok(()) => {
                debug!("Output {}", if muted { "muted" } else { "unmuted" });
                self.state.output_muted = Some(muted);
            }
            Err(e) => warn!("Failed to set output mute: {}", e),
        }
    }

    fn with_hdcp<R>(&mut self, f: impl FnOnce(&mut HdcpEngine, &mut HdcpContext<'_>) -> R) -> R {
        let mut context = HdcpContext {
            hardware: &mut self.hardware,
            upstream: &mut self.upstream,
        };
        f(&mut self.state.hdcp, &mut context)
    }

    fn notify(&mut self, event: NotificationEvent) {
        self.notifications.notify(Notification {
            at: self.state.now,
            event,
        });
    }
}
