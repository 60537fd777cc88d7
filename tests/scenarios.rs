mod common;

use common::{MockHardware, MockUpstream, link_transitions};
use hdmi_rx_engine::{
    Event, InputPort, Notification, NotificationEvent, NotificationKind, PacketKind, Receiver,
    ReceiverConfig, SignalEdge,
    edid::{
        CapabilitySet, CompositionMode, DataBlock, EdidComposer, EdidConfig, PhysicalAddress,
        defaults,
    },
    hdcp::{HdcpConfig, HdcpMode, HdcpReason, HdcpState, HdcpVersion, StreamType},
    link::{LinkState, ResetKind, TransitionReason},
};

type Rig = Receiver<MockHardware, MockUpstream, Vec<Notification>>;

fn rig(config: ReceiverConfig) -> (Rig, MockHardware, MockUpstream) {
    let hardware = MockHardware::locked(config.port);
    let upstream = MockUpstream::default();
    let receiver = Receiver::new(config, hardware.clone(), upstream.clone(), Vec::new());
    (receiver, hardware, upstream)
}

fn tick_until_stable(receiver: &mut Rig) -> u32 {
    for tick in 1..=100 {
        receiver.handle(Event::Tick);
        if receiver.link_state() == LinkState::Stable {
            return tick;
        }
    }
    panic!("link never became stable");
}

fn hdcp_transitions(notifications: &[Notification]) -> Vec<(HdcpVersion, HdcpState, HdcpReason)> {
    notifications
        .iter()
        .filter_map(|notification| match notification.event {
            NotificationEvent::HdcpStateChanged {
                version, to, reason, ..
            } => Some((version, to, reason)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_link_acquisition_from_power_up() {
    let (mut receiver, hardware, _) = rig(ReceiverConfig::default());
    hardware.bench().sample.clock_detect = false;

    for _ in 0..5 {
        receiver.handle(Event::Tick);
    }
    assert_eq!(receiver.link_state(), LinkState::DetectClock);

    // Two ticks of a steady clock move the link on to the analog reset
    hardware.bench().sample.clock_detect = true;
    receiver.handle(Event::Tick);
    assert_eq!(receiver.link_state(), LinkState::DetectClock);
    receiver.handle(Event::Tick);
    assert_eq!(receiver.link_state(), LinkState::ResetAnalog);

    receiver.handle(Event::Tick);
    assert_eq!(receiver.link_state(), LinkState::ResetDigital);
    receiver.handle(Event::Tick);
    assert_eq!(receiver.link_state(), LinkState::WaitTimingStable);

    let link = receiver.config().link.clone();
    let ticks = tick_until_stable(&mut receiver);
    assert_eq!(ticks, link.settle_ticks + link.stable_ticks);

    assert_eq!(
        link_transitions(receiver.notifications()),
        vec![
            (LinkState::NoSignal, LinkState::DetectClock),
            (LinkState::DetectClock, LinkState::ResetAnalog),
            (LinkState::ResetAnalog, LinkState::ResetDigital),
            (LinkState::ResetDigital, LinkState::WaitTimingStable),
            (LinkState::WaitTimingStable, LinkState::Stable),
        ]
    );
    let bench = hardware.bench();
    assert_eq!(bench.resets, vec![ResetKind::Analog, ResetKind::Digital]);
    assert_eq!(bench.output_muted, Some(false));
}

#[test]
fn test_unstable_timing_resets_stable_link() {
    let (mut receiver, hardware, _) = rig(ReceiverConfig::default());
    tick_until_stable(&mut receiver);
    let tolerance = receiver.config().link.timing_tolerance;
    hardware.bench().sample.h_total = 2200 + tolerance + 1;

    let mut states = Vec::new();
    for _ in 0..4 {
        receiver.handle(Event::Tick);
        states.push(receiver.link_state());
    }
    // The third unstable sample crosses the threshold
    assert_eq!(&states[..3], &[LinkState::Stable, LinkState::Stable, LinkState::ResetAnalog]);
    assert!(receiver.notifications().iter().any(|notification| {
        notification.event
            == NotificationEvent::LinkStateChanged {
                from: LinkState::Stable,
                to: LinkState::ResetAnalog,
                reason: TransitionReason::TimingUnstable,
            }
    }));
    assert_eq!(hardware.bench().output_muted, Some(true));
}

#[test]
fn test_unstable_burst_resets_regardless_of_when_it_starts() {
    let window = ReceiverConfig::default().link.unstable_window_ticks;
    for lead in 0..=window * 2 {
        let (mut receiver, hardware, _) = rig(ReceiverConfig::default());
        tick_until_stable(&mut receiver);
        for _ in 0..lead {
            receiver.handle(Event::Tick);
        }
        assert_eq!(receiver.link_state(), LinkState::Stable, "lead {lead}");

        hardware.bench().sample.h_total = 2206;
        let mut states = Vec::new();
        for _ in 0..4 {
            receiver.handle(Event::Tick);
            states.push(receiver.link_state());
        }
        assert_eq!(states[2], LinkState::ResetAnalog, "lead {lead}: {states:?}");
    }
}

#[test]
fn test_sporadic_instability_tolerated() {
    let (mut receiver, hardware, _) = rig(ReceiverConfig::default());
    tick_until_stable(&mut receiver);
    let link = receiver.config().link.clone();

    let glitch = |receiver: &mut Rig, count: u32| {
        hardware.bench().sample.h_total = 2200 + link.timing_tolerance + 1;
        for _ in 0..count {
            receiver.handle(Event::Tick);
        }
        hardware.bench().sample.h_total = 2200;
    };

    glitch(&mut receiver, link.unstable_threshold - 1);
    for _ in 0..link.unstable_window_ticks {
        receiver.handle(Event::Tick);
    }
    glitch(&mut receiver, link.unstable_threshold - 1);
    receiver.handle(Event::Tick);
    assert_eq!(receiver.link_state(), LinkState::Stable);
}

#[test]
fn test_repeater_gives_up_on_silent_downstream() {
    let hdcp = HdcpConfig {
        downstream_wait_ticks: 10,
        ..HdcpConfig::new(HdcpMode::Repeater)
    };
    let (mut receiver, hardware, upstream) = rig(ReceiverConfig::default().with_hdcp(hdcp));
    tick_until_stable(&mut receiver);

    receiver.handle(SignalEdge::AuthenticationStart(HdcpVersion::V1).into());
    assert_eq!(upstream.transmitter().started, vec![HdcpVersion::V1]);
    assert_eq!(receiver.snapshot().hdcp1.state, HdcpState::Computations);

    hardware.bench().hdcp1.auth_done = true;
    receiver.handle(Event::Tick);
    assert_eq!(receiver.snapshot().hdcp1.state, HdcpState::WaitForDownstream);

    for _ in 0..10 {
        receiver.handle(Event::Tick);
    }
    assert_eq!(receiver.snapshot().hdcp1.state, HdcpState::WaitForDownstream);
    receiver.handle(Event::Tick);
    assert_eq!(receiver.snapshot().hdcp1.state, HdcpState::Unauthenticated);

    assert_eq!(
        hdcp_transitions(receiver.notifications()).last(),
        Some(&(
            HdcpVersion::V1,
            HdcpState::Unauthenticated,
            HdcpReason::DownstreamTimeout
        ))
    );
    assert_eq!(receiver.link_state(), LinkState::Stable);
}

#[test]
fn test_repeater_completes_with_downstream() {
    let (mut receiver, hardware, upstream) =
        rig(ReceiverConfig::default().with_hdcp(HdcpConfig::new(HdcpMode::Repeater)));
    tick_until_stable(&mut receiver);

    receiver.handle(SignalEdge::AuthenticationStart(HdcpVersion::V1).into());
    hardware.bench().hdcp1.auth_done = true;
    receiver.handle(Event::Tick);
    upstream.transmitter().authenticated = true;
    receiver.handle(Event::Tick);
    assert_eq!(receiver.snapshot().hdcp1.state, HdcpState::WaitVReady);
    assert_eq!(upstream.transmitter().published.len(), 1);

    hardware.bench().hdcp1.ready = true;
    receiver.handle(Event::Tick);
    assert_eq!(receiver.snapshot().hdcp1.state, HdcpState::Authenticated);
}

#[test]
fn test_corrupt_sink_edid_yields_builtin() {
    let mut blocks = defaults::builtin_descriptor().to_blocks().unwrap();
    blocks[0][0x20] ^= 0xFF;

    let composer = EdidComposer::new(EdidConfig::default());
    let composed = composer.compose(&blocks);
    assert_eq!(composed, composer.fallback());
    assert_eq!(composed.descriptor, defaults::builtin_descriptor());

    let (mut receiver, hardware, _) = rig(ReceiverConfig::default());
    hardware.bench().blocks = blocks;
    receiver.handle(Event::CableAttach);
    let snapshot = receiver.snapshot();
    assert!(snapshot.composed.unwrap().fallback);
    assert!(snapshot.sink.is_none());
    let expected = composer.fallback();
    let image = expected.image(InputPort::new(0)).unwrap();
    assert_eq!(hardware.bench().descriptors.last().unwrap().1, image.as_bytes());
}

#[test]
fn test_corrupt_extension_yields_builtin() {
    let mut blocks = defaults::builtin_descriptor().to_blocks().unwrap();
    blocks[1][10] ^= 0x01;
    let composer = EdidComposer::new(EdidConfig::default());
    assert!(composer.compose(&blocks).fallback);
}

#[test]
fn test_intersect_mode_ands_bitmasks() {
    let with_speakers = |mask: u8| {
        let mut descriptor = defaults::builtin_descriptor();
        for block in &mut descriptor.extension.as_mut().unwrap().blocks {
            if let DataBlock::SpeakerAllocation(speakers) = block {
                *speakers = [mask, 0, 0];
            }
        }
        descriptor
    };
    let composer = EdidComposer::with_local(EdidConfig::default(), with_speakers(0b1010));
    let composed = composer.compose_from(&with_speakers(0b1110)).unwrap();
    let extension = composed.descriptor.extension.unwrap();
    assert_eq!(extension.speaker_allocation(), Some([0b1010, 0, 0]));
}

#[test]
fn test_attached_sink_bounds_advertised_capabilities() {
    let config = ReceiverConfig::default().with_edid(EdidConfig::default().with_port_count(2));
    let (mut receiver, hardware, _) = rig(config);
    hardware.bench().blocks = defaults::builtin_descriptor().to_blocks().unwrap();
    receiver.handle(Event::CableAttach);

    let snapshot = receiver.snapshot();
    let sink = snapshot.sink.clone().unwrap();
    assert!(snapshot.advertised.is_subset_of(&sink));
    assert_eq!(snapshot.capability_generation, 2);

    let composed = snapshot.composed.unwrap();
    assert!(!composed.fallback);
    assert_eq!(
        composed.image(InputPort::new(1)).unwrap().physical_address(),
        Some(PhysicalAddress::new(0x1200))
    );
    let advertised = CapabilitySet::from_descriptor(&composed.descriptor);
    assert_eq!(advertised, snapshot.advertised);
}

#[test]
fn test_edid_mode_request_recomposes() {
    let (mut receiver, hardware, _) = rig(ReceiverConfig::default());
    hardware.bench().blocks = defaults::builtin_descriptor().to_blocks().unwrap();
    receiver.handle(Event::CableAttach);
    receiver.handle(Event::EdidModeRequest {
        video: CompositionMode::PassThrough,
        audio: CompositionMode::Intersect,
    });
    assert_eq!(receiver.snapshot().capability_generation, 3);
    let updates = receiver
        .notifications()
        .iter()
        .filter(|notification| notification.kind() == NotificationKind::CapabilityDescriptor)
        .count();
    assert_eq!(updates, 3);
}

#[test]
fn test_hdcp_unauthenticated_whenever_link_down() {
    let (mut receiver, hardware, _) = rig(ReceiverConfig::default());
    let check = |receiver: &Rig| {
        let snapshot = receiver.snapshot();
        if !snapshot.is_stable() {
            assert_eq!(snapshot.hdcp1.state, HdcpState::Unauthenticated);
            assert_eq!(snapshot.hdcp2.state, HdcpState::Unauthenticated);
            assert!(snapshot.output_muted);
        }
    };

    for _ in 0..100 {
        receiver.handle(Event::Tick);
        check(&receiver);
        if receiver.link_state() == LinkState::Stable {
            break;
        }
    }
    receiver.handle(SignalEdge::AuthenticationStart(HdcpVersion::V2).into());
    hardware.bench().hdcp2.auth_done = true;
    receiver.handle(Event::Tick);
    assert_eq!(receiver.snapshot().hdcp2.state, HdcpState::Authenticated);

    hardware.bench().sample.clock_detect = false;
    receiver.handle(SignalEdge::Clock.into());
    assert_eq!(receiver.link_state(), LinkState::DetectClock);
    check(&receiver);

    hardware.bench().sample.clock_detect = true;
    for _ in 0..100 {
        receiver.handle(Event::Tick);
        check(&receiver);
        if receiver.link_state() == LinkState::Stable {
            break;
        }
    }
    assert_eq!(receiver.link_state(), LinkState::Stable);
    assert!(
        link_transitions(receiver.notifications())
            .iter()
            .all(|(from, to)| from.can_transition_to(*to))
    );
}

#[test]
fn test_port_switch_drops_link() {
    let (mut receiver, _, _) = rig(ReceiverConfig::default());
    tick_until_stable(&mut receiver);
    receiver.handle(Event::SelectPort(InputPort::new(1)));
    receiver.handle(Event::Tick);
    assert_eq!(receiver.link_state(), LinkState::NoSignal);
    assert_eq!(receiver.snapshot().port, InputPort::new(1));
    assert!(receiver.notifications().iter().any(|notification| {
        matches!(
            notification.event,
            NotificationEvent::LinkStateChanged {
                to: LinkState::NoSignal,
                reason: TransitionReason::PortChanged,
                ..
            }
        )
    }));
}

#[test]
fn test_type1_content_muted_on_hdcp1_repeater() {
    let (mut receiver, hardware, upstream) =
        rig(ReceiverConfig::default().with_hdcp(HdcpConfig::new(HdcpMode::Repeater)));
    tick_until_stable(&mut receiver);
    receiver.handle(SignalEdge::AuthenticationStart(HdcpVersion::V1).into());
    receiver.handle(Event::StreamTypeChanged(Some(StreamType::Type1)));
    assert!(receiver.snapshot().stream_muted);
    assert_eq!(hardware.bench().output_muted, Some(true));
    assert_eq!(upstream.transmitter().stream_mute, Some(true));
}

#[test]
fn test_packet_timeouts_only_while_stable() {
    let mut config = ReceiverConfig::default();
    config.packet_timeout_ticks = 5;
    let (mut receiver, _, _) = rig(config);
    for _ in 0..20 {
        receiver.handle(Event::Tick);
    }
    assert!(
        receiver
            .notifications()
            .iter()
            .all(|notification| notification.kind() != NotificationKind::PacketTimeout)
    );

    tick_until_stable(&mut receiver);
    receiver.handle(PacketKind::Avi.into());
    for _ in 0..5 {
        receiver.handle(Event::Tick);
    }
    let timeouts: Vec<_> = receiver
        .notifications()
        .iter()
        .filter(|notification| notification.kind() == NotificationKind::PacketTimeout)
        .collect();
    assert_eq!(timeouts.len(), 1);
    assert_eq!(timeouts[0].event, NotificationEvent::PacketTimeout(PacketKind::Avi));
}

#[test]
fn test_notification_timestamps_never_decrease() {
    let (mut receiver, hardware, _) = rig(ReceiverConfig::default());
    tick_until_stable(&mut receiver);
    hardware.bench().sample.power_detect = false;
    receiver.handle(SignalEdge::Power.into());
    receiver.handle(Event::Tick);
    let notifications = receiver.notifications();
    assert!(notifications.windows(2).all(|pair| pair[0].at <= pair[1].at));
    assert_eq!(notifications[0].at.tick, 0);
}
