use super::{HdcpVersion, Ksv};

/// Capacity of a device list: the largest HDCP 2.x count plus the
/// downstream receiver itself.
pub const MAX_KSV_LIST: usize = 32;

const HDCP1_MAX_DEVICES: u8 = 10;
const HDCP1_MAX_DEPTH: u8 = 7;
const HDCP2_MAX_DEVICES: u8 = 31;
const HDCP2_MAX_DEPTH: u8 = 4;

// HDCP 1.x BStatus
const V1_DEVICE_COUNT: u16 = 0x007F;
const V1_MAX_DEVS_EXCEEDED: u16 = 1 << 7;
const V1_DEPTH: u16 = 0x07 << 8;
const V1_MAX_CASCADE_EXCEEDED: u16 = 1 << 11;

// HDCP 2.x RxInfo
const V2_HDCP1_DEVICE_DOWNSTREAM: u16 = 1 << 0;
const V2_HDCP2_REPEATER_DOWNSTREAM: u16 = 1 << 1;
const V2_MAX_CASCADE_EXCEEDED: u16 = 1 << 2;
const V2_MAX_DEVS_EXCEEDED: u16 = 1 << 3;
const V2_DEVICE_COUNT: u16 = 0x1F << 4;
const V2_DEPTH: u16 = 0x07 << 9;

/// What the downstream transmitter learned while authenticating its sink.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DownstreamReport {
    pub version: HdcpVersion,
    /// BStatus (1.x) or RxInfo (2.x) as read from the downstream device.
    pub bstatus: u16,
    /// KSV or receiver id of the directly attached downstream device.
    pub bksv: Ksv,
    /// Devices behind the downstream device, if it is itself a repeater.
    pub ksv_list: heapless::Vec<Ksv, MAX_KSV_LIST>,
    /// The downstream V' matched.
    pub ksv_match: bool,
}

/// Repeater topology as reported upstream by this device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RepeaterTopology {
    pub version: HdcpVersion,
    /// Devices downstream of this repeater, including the attached sink.
    pub device_count: u8,
    /// Repeater levels below the source, including this one.
    pub depth: u8,
    pub devices: heapless::Vec<Ksv, MAX_KSV_LIST>,
    pub max_devices_exceeded: bool,
    pub max_cascade_exceeded: bool,
    /// An HDCP 1.x device sits somewhere downstream.
    pub hdcp1_device_downstream: bool,
    /// An HDCP 2.0 repeater sits somewhere downstream.
    pub hdcp2_repeater_downstream: bool,
    pub ksv_match: bool,
}

impl RepeaterTopology {
    /// Topology of a repeater that has not heard from its downstream side.
    #[must_use]
    pub fn empty(version: HdcpVersion) -> Self {
        Self {
            version,
            device_count: 0,
            depth: 0,
            devices: heapless::Vec::new(),
            max_devices_exceeded: false,
            max_cascade_exceeded: false,
            hdcp1_device_downstream: version == HdcpVersion::V1,
            hdcp2_repeater_downstream: false,
            ksv_match: false,
        }
    }

    /// Build this repeater's topology from the downstream report: the
    /// downstream list plus the attached device, one level deeper.
    ///
    /// Counts and depths above the protocol limits are clamped and flagged.
    #[must_use]
    pub fn from_report(report: &DownstreamReport) -> Self {
        let version = report.version;
        let bstatus = report.bstatus;
        let (max_devices, max_depth) = limits(version);

        let mut topology = Self::empty(version);
        let (reported_count, reported_depth) = match version {
            HdcpVersion::V1 => {
                topology.max_devices_exceeded = bstatus & V1_MAX_DEVS_EXCEEDED != 0;
                topology.max_cascade_exceeded = bstatus & V1_MAX_CASCADE_EXCEEDED != 0;
                (
                    (bstatus & V1_DEVICE_COUNT) as u8,
                    ((bstatus & V1_DEPTH) >> 8) as u8,
                )
            }
            HdcpVersion::V2 => {
                topology.max_devices_exceeded = bstatus & V2_MAX_DEVS_EXCEEDED != 0;
                topology.max_cascade_exceeded = bstatus & V2_MAX_CASCADE_EXCEEDED != 0;
                topology.hdcp1_device_downstream = bstatus & V2_HDCP1_DEVICE_DOWNSTREAM != 0;
                topology.hdcp2_repeater_downstream =
                    bstatus & V2_HDCP2_REPEATER_DOWNSTREAM != 0;
                (
                    ((bstatus & V2_DEVICE_COUNT) >> 4) as u8,
                    ((bstatus & V2_DEPTH) >> 9) as u8,
                )
            }
        };

        if reported_count > max_devices {
            topology.max_devices_exceeded = true;
        }
        for ksv in report
            .ksv_list
            .iter()
            .take(usize::from(reported_count.min(max_devices)))
        {
            if topology.devices.push(*ksv).is_err() {
                break;
            }
        }
        if topology.devices.len() >= usize::from(max_devices)
            || topology.devices.push(report.bksv).is_err()
        {
            topology.max_devices_exceeded = true;
        }
        topology.device_count = topology.devices.len() as u8;

        topology.depth = reported_depth + 1;
        if topology.depth > max_depth {
            topology.depth = max_depth;
            topology.max_cascade_exceeded = true;
        }
        topology.ksv_match = report.ksv_match;
        topology
    }

    /// Whether Type 1 content may flow through this topology.
    #[must_use]
    pub fn carries_type1(&self) -> bool {
        self.version == HdcpVersion::V2
            && !self.hdcp1_device_downstream
            && !self.hdcp2_repeater_downstream
    }

    /// Encode the topology as the BStatus (1.x) or RxInfo (2.x) word this
    /// repeater reports to its source.
    #[must_use]
    pub fn to_bstatus(&self) -> u16 {
        let count = u16::from(self.device_count);
        let depth = u16::from(self.depth);
        match self.version {
            HdcpVersion::V1 => {
                let mut value = (count & V1_DEVICE_COUNT) | ((depth << 8) & V1_DEPTH);
                if self.max_devices_exceeded {
                    value |= V1_MAX_DEVS_EXCEEDED;
                }
                if self.max_cascade_exceeded {
                    value |= V1_MAX_CASCADE_EXCEEDED;
                }
                value
            }
            HdcpVersion::V2 => {
                let mut value = ((count << 4) & V2_DEVICE_COUNT) | ((depth << 9) & V2_DEPTH);
                if self.hdcp1_device_downstream {
                    value |= V2_HDCP1_DEVICE_DOWNSTREAM;
                }
                if self.hdcp2_repeater_downstream {
                    value |= V2_HDCP2_REPEATER_DOWNSTREAM;
                }
                if self.max_cascade_exceeded {
                    value |= V2_MAX_CASCADE_EXCEEDED;
                }
                if self.max_devices_exceeded {
                    value |= V2_MAX_DEVS_EXCEEDED;
                }
                value
            }
        }
    }
}

fn limits(version: HdcpVersion) -> (u8, u8) {
    match version {
        HdcpVersion::V1 => (HDCP1_MAX_DEVICES, HDCP1_MAX_DEPTH),
        HdcpVersion::V2 => (HDCP2_MAX_DEVICES, HDCP2_MAX_DEPTH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ksv(n: u8) -> Ksv {
        [n, n, n, n, n]
    }

    #[test]
    fn test_v1_report_adds_attached_device() {
        let report = DownstreamReport {
            version: HdcpVersion::V1,
            // two devices, depth one
            bstatus: 0x0102,
            bksv: ksv(9),
            ksv_list: heapless::Vec::from_slice(&[ksv(1), ksv(2)]).unwrap(),
            ksv_match: true,
        };
        let topology = RepeaterTopology::from_report(&report);
        assert_eq!(topology.device_count, 3);
        assert_eq!(topology.depth, 2);
        assert_eq!(topology.devices.as_slice(), &[ksv(1), ksv(2), ksv(9)]);
        assert!(topology.hdcp1_device_downstream);
        assert!(!topology.max_devices_exceeded);
        assert!(topology.ksv_match);
        assert!(!topology.carries_type1());
    }

    #[test]
    fn test_v1_sink_only() {
        let report = DownstreamReport {
            version: HdcpVersion::V1,
            bstatus: 0,
            bksv: ksv(7),
            ksv_list: heapless::Vec::new(),
            ksv_match: false,
        };
        let topology = RepeaterTopology::from_report(&report);
        assert_eq!(topology.device_count, 1);
        assert_eq!(topology.depth, 1);
        assert_eq!(topology.to_bstatus(), 0x0101);
    }

    #[test]
    fn test_v2_limits_are_clamped() {
        let list: heapless::Vec<Ksv, MAX_KSV_LIST> = (0..31).map(ksv).collect();
        let report = DownstreamReport {
            version: HdcpVersion::V2,
            // 31 devices, depth 4
            bstatus: (31 << 4) | (4 << 9),
            bksv: ksv(0xAA),
            ksv_list: list,
            ksv_match: false,
        };
        let topology = RepeaterTopology::from_report(&report);
        assert_eq!(topology.device_count, 31);
        assert!(topology.max_devices_exceeded);
        assert_eq!(topology.depth, 4);
        assert!(topology.max_cascade_exceeded);
    }

    #[test]
    fn test_v2_type1_capability() {
        let mut report = DownstreamReport {
            version: HdcpVersion::V2,
            bstatus: 1 << 4,
            bksv: ksv(3),
            ksv_list: heapless::Vec::from_slice(&[ksv(4)]).unwrap(),
            ksv_match: false,
        };
        assert!(RepeaterTopology::from_report(&report).carries_type1());

        report.bstatus |= V2_HDCP1_DEVICE_DOWNSTREAM;
        let topology = RepeaterTopology::from_report(&report);
        assert!(!topology.carries_type1());

        report.bstatus = V2_HDCP2_REPEATER_DOWNSTREAM | (1 << 4) | (1 << 9);
        let topology = RepeaterTopology::from_report(&report);
        assert!(topology.hdcp2_repeater_downstream);
        assert!(!topology.hdcp1_device_downstream);
        assert!(!topology.carries_type1());
        assert_eq!(topology.to_bstatus() & V2_HDCP1_DEVICE_DOWNSTREAM, 1);
    }

    #[test]
    fn test_short_list_is_not_padded() {
        let report = DownstreamReport {
            version: HdcpVersion::V1,
            // claims three devices but lists one
            bstatus: 0x0003,
            bksv: ksv(5),
            ksv_list: heapless::Vec::from_slice(&[ksv(1)]).unwrap(),
            ksv_match: false,
        };
        let topology = RepeaterTopology::from_report(&report);
        assert_eq!(topology.devices.as_slice(), &[ksv(1), ksv(5)]);
    }
}
