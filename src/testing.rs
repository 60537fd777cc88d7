//! Hardware and upstream doubles for unit tests.

use crate::{
    HardwareError, InputPort,
    edid::BLOCK_SIZE,
    hdcp::{HdcpRegisterWrite, HdcpStatus, HdcpVersion, RepeaterTopology},
    link::{ResetKind, SignalSample},
    traits::{Hardware, Upstream},
};

/// A 1080p60 source on `port` with every detect flag raised.
pub(crate) fn locked_sample(port: InputPort) -> SignalSample {
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

#[derive(Debug, Default)]
pub(crate) struct FakeHardware {
    pub(crate) sample: SignalSample,
    pub(crate) sample_timeout: bool,
    pub(crate) fail_resets: bool,
    pub(crate) resets: Vec<ResetKind>,
    pub(crate) blocks: Vec<[u8; BLOCK_SIZE]>,
    pub(crate) descriptors: Vec<(InputPort, Vec<u8>)>,
    pub(crate) hdcp1: HdcpStatus,
    pub(crate) hdcp2: HdcpStatus,
    pub(crate) hdcp_writes: Vec<HdcpRegisterWrite>,
    pub(crate) output_muted: Option<bool>,
}

impl Hardware for FakeHardware {
    fn read_signal_sample(&mut self) -> Result<SignalSample, HardwareError> {
        if self.sample_timeout {
            return Err(HardwareError::Timeout);
        }
        Ok(self.sample)
    }

    fn issue_reset(&mut self, kind: ResetKind) -> Result<(), HardwareError> {
        if self.fail_resets {
            return Err(HardwareError::Timeout);
        }
        self.resets.push(kind);
        Ok(())
    }

    fn read_capability_block(&mut self, index: u8) -> Result<[u8; BLOCK_SIZE], HardwareError> {
        self.blocks
            .get(usize::from(index))
            .copied()
            .ok_or(HardwareError::BlockUnavailable(index))
    }

    fn write_capability_descriptor(
        &mut self,
        port: InputPort,
        bytes: &[u8],
    ) -> Result<(), HardwareError> {
        self.descriptors.push((port, bytes.to_vec()));
        Ok(())
    }

    fn read_hdcp_register(&mut self, version: HdcpVersion) -> Result<HdcpStatus, HardwareError> {
        Ok(match version {
            HdcpVersion::V1 => self.hdcp1,
            HdcpVersion::V2 => self.hdcp2,
        })
    }

    fn write_hdcp_register(&mut self, write: HdcpRegisterWrite) -> Result<(), HardwareError> {
        self.hdcp_writes.push(write);
        Ok(())
    }

    fn set_output_mute(&mut self, muted: bool) -> Result<(), HardwareError> {
        self.output_muted = Some(muted);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeUpstream {
    pub(crate) authenticated: bool,
    pub(crate) started: Vec<HdcpVersion>,
    pub(crate) published: Vec<(HdcpVersion, RepeaterTopology)>,
    pub(crate) signal_offs: u32,
    pub(crate) stream_mute: Option<bool>,
}

impl Upstream for FakeUpstream {
    fn begin_authentication(&mut self, version: HdcpVersion) {
        self.started.push(version);
    }

    fn publish_topology(&mut self, version: HdcpVersion, topology: &RepeaterTopology) {
        self.published.push((version, topology.clone()));
    }

    fn is_upstream_authenticated(&self, _version: HdcpVersion) -> bool {
        self.authenticated
    }

    fn signal_off(&mut self) {
        self.signal_offs += 1;
    }

    fn set_stream_mute(&mut self, muted: bool) {
        self.stream_mute = Some(muted);
    }
}
