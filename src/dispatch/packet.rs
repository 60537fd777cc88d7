use tracing::debug;

use super::Timestamp;

/// InfoFrame and control packets whose arrival is tracked.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PacketKind {
    /// Auxiliary video information.
    Avi,
    Audio,
    /// Vendor specific InfoFrame.
    Vendor,
    /// Dynamic range and mastering InfoFrame.
    HdrStatic,
    GeneralControl,
}

impl PacketKind {
    pub const ALL: [PacketKind; 5] = [
        PacketKind::Avi,
        PacketKind::Audio,
        PacketKind::Vendor,
        PacketKind::HdrStatic,
        PacketKind::GeneralControl,
    ];

    const fn index(self) -> usize {
        match self {
            PacketKind::Avi => 0,
            PacketKind::Audio => 1,
            PacketKind::Vendor => 2,
            PacketKind::HdrStatic => 3,
            PacketKind::GeneralControl => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Slot {
    last_seen: Option<Timestamp>,
    reported: bool,
}

/// Reports packet kinds that stopped arriving while the link is stable.
///
/// Only kinds seen since the last re-arm are watched, and each silence is
/// reported once.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PacketTracker {
    timeout_ticks: u64,
    armed: bool,
    slots: [Slot; PacketKind::ALL.len()],
}

impl PacketTracker {
    #[must_use]
    pub fn new(timeout_ticks: u32) -> Self {
        Self {
            timeout_ticks: u64::from(timeout_ticks),
            armed: false,
            slots: Default::default(),
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn rearm(&mut self) {
        self.armed = true;
        self.slots = Default::default();
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.slots = Default::default();
    }

    pub fn on_arrival(&mut self, kind: PacketKind, now: Timestamp) {
        if !self.armed {
            return;
        }
        let slot = &mut self.slots[kind.index()];
        if slot.reported {
            debug!("{:?} packets resumed", kind);
        }
        *slot = Slot {
            last_seen: Some(now),
            reported: false,
        };
    }

    /// Kinds whose silence reached the timeout on this tick.
    pub fn poll(&mut self, now: Timestamp) -> heapless::Vec<PacketKind, 5> {
        let mut expired = heapless::Vec::new();
        if !self.armed {
            return expired;
        }
        for kind in PacketKind::ALL {
            let slot = &mut self.slots[kind.index()];
            let Some(seen) = slot.last_seen else {
                continue;
            };
            if !slot.reported && now.ticks_since(seen) >= self.timeout_ticks {
                if expired.push(kind).is_err() {
                    debug!("Packet timeout list full, {:?} deferred", kind);
                    break;
                }
                slot.reported = true;
            }
        }
        expired
    }
}
