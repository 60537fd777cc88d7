#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use hdmi_rx_engine::{
    HardwareError, InputPort, Notification, NotificationEvent,
    edid::BLOCK_SIZE,
    hdcp::{HdcpRegisterWrite, HdcpStatus, HdcpVersion, RepeaterTopology},
    link::{LinkState, ResetKind, SignalSample},
    traits::{Hardware, Upstream},
};

/// A 1080p60 source on `port` with every detect flag raised.
pub fn locked_sample(port: InputPort) -> SignalSample {
    SignalSample {
        active_port: port,
        power_detect: true,
        clock_detect: true,
        sync_detect: true,
        h_total: 2200,
        v_total: 1125,
        pixel_clock: 14850,
        reference_clock: 742,
        ..Default::default()
    }
}

/// Register state shared between a test and the hardware handed to the
/// engine.
#[derive(Debug, Default)]
pub struct Bench {
    pub sample: SignalSample,
    pub sample_timeout: bool,
    pub resets: Vec<ResetKind>,
    pub blocks: Vec<[u8; BLOCK_SIZE]>,
    pub descriptors: Vec<(InputPort, Vec<u8>)>,
    pub hdcp1: HdcpStatus,
    pub hdcp2: HdcpStatus,
    pub hdcp_writes: Vec<HdcpRegisterWrite>,
    pub output_muted: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct MockHardware {
    bench: Arc<Mutex<Bench>>,
}

impl MockHardware {
    pub fn locked(port: InputPort) -> Self {
        let hardware = Self::default();
        hardware.bench().sample = locked_sample(port);
        hardware
    }

    pub fn bench(&self) -> MutexGuard<'_, Bench> {
        self.bench.lock().unwrap()
    }
}

impl Hardware for MockHardware {
    fn read_signal_sample(&mut self) -> Result<SignalSample, HardwareError> {
        let bench = self.bench();
        if bench.sample_timeout {
            return Err(HardwareError::Timeout);
        }
        Ok(bench.sample)
    }

    fn issue_reset(&mut self, kind: ResetKind) -> Result<(), HardwareError> {
        self.bench().resets.push(kind);
        Ok(())
    }

    fn read_capability_block(&mut self, index: u8) -> Result<[u8; BLOCK_SIZE], HardwareError> {
        self.bench()
            .blocks
            .get(usize::from(index))
            .copied()
            .ok_or(HardwareError::BlockUnavailable(index))
    }

    fn write_capability_descriptor(
        &mut self,
        port: InputPort,
        bytes: &[u8],
    ) -> Result<(), HardwareError> {
        self.bench().descriptors.push((port, bytes.to_vec()));
        Ok(())
    }

    fn read_hdcp_register(&mut self, version: HdcpVersion) -> Result<HdcpStatus, HardwareError> {
        let bench = self.bench();
        Ok(match version {
            HdcpVersion::V1 => bench.hdcp1,
            HdcpVersion::V2 => bench.hdcp2,
        })
    }

    fn write_hdcp_register(&mut self, write: HdcpRegisterWrite) -> Result<(), HardwareError> {
        self.bench().hdcp_writes.push(write);
        Ok(())
    }

    fn set_output_mute(&mut self, muted: bool) -> Result<(), HardwareError> {
        self.bench().output_muted = Some(muted);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Transmitter {
    pub authenticated: bool,
    pub started: Vec<HdcpVersion>,
    pub published: Vec<(HdcpVersion, RepeaterTopology)>,
    pub signal_offs: u32,
    pub stream_mute: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct MockUpstream {
    transmitter: Arc<Mutex<Transmitter>>,
}

impl MockUpstream {
    pub fn transmitter(&self) -> MutexGuard<'_, Transmitter> {
        self.transmitter.lock().unwrap()
    }
}

impl Upstream for MockUpstream {
    fn begin_authentication(&mut self, version: HdcpVersion) {
        self.transmitter().started.push(version);
    }

    fn publish_topology(&mut self, version: HdcpVersion, topology: &RepeaterTopology) {
        self.transmitter().published.push((version, topology.clone()));
    }

    fn is_upstream_authenticated(&self, _version: HdcpVersion) -> bool {
        self.transmitter().authenticated
    }

    fn signal_off(&mut self) {
        self.transmitter().signal_offs += 1;
    }

    fn set_stream_mute(&mut self, muted: bool) {
        self.transmitter().stream_mute = Some(muted);
    }
}

/// Every link transition in the order it was reported.
pub fn link_transitions(notifications: &[Notification]) -> Vec<(LinkState, LinkState)> {
    notifications
        .iter()
        .filter_map(|notification| match notification.event {
            NotificationEvent::LinkStateChanged { from, to, .. } => Some((from, to)),
            _ => None,
        })
        .collect()
}
