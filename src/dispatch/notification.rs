use std::time::Duration;

use super::PacketKind;
use crate::edid::PhysicalAddress;
use crate::hdcp::{HdcpReason, HdcpState, HdcpVersion};
use crate::link::{LinkState, TransitionReason};

/// Position on the dispatcher's tick counter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    pub tick: u64,
}

impl Timestamp {
    #[must_use]
    pub const fn new(tick: u64) -> Self {
        Self { tick }
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            tick: self.tick.saturating_add(1),
        }
    }

    /// Ticks since `earlier`, zero if `earlier` lies in the future.
    #[must_use]
    pub const fn ticks_since(self, earlier: Timestamp) -> u64 {
        self.tick.saturating_sub(earlier.tick)
    }

    /// Wall-clock time since start-up for the given tick period.
    #[must_use]
    pub fn elapsed(self, period: Duration) -> Duration {
        period.saturating_mul(u32::try_from(self.tick).unwrap_or(u32::MAX))
    }
}

/// Stable numeric category of a notification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NotificationKind {
    LinkState,
    HdcpState,
    CapabilityDescriptor,
    StreamMute,
    PacketTimeout,
}

impl NotificationKind {
    /// Numeric code for consumers that cannot match on the enum.
    #[must_use]
    pub fn to_code(self) -> u8 {
        match self {
            NotificationKind::LinkState => 1,
            NotificationKind::HdcpState => 2,
            NotificationKind::CapabilityDescriptor => 3,
            NotificationKind::StreamMute => 4,
            NotificationKind::PacketTimeout => 5,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NotificationEvent {
    LinkStateChanged {
        from: LinkState,
        to: LinkState,
        reason: TransitionReason,
    },
    HdcpStateChanged {
        version: HdcpVersion,
        from: HdcpState,
        to: HdcpState,
        reason: HdcpReason,
    },
    /// A new EDID was loaded into the ports' EDID memory.
    CapabilityDescriptorUpdated {
        /// The built-in descriptor is advertised.
        fallback: bool,
        physical_address: PhysicalAddress,
        ports: u8,
    },
    StreamMuteChanged { muted: bool },
    PacketTimeout(PacketKind),
}

impl NotificationEvent {
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationEvent::LinkStateChanged { .. } => NotificationKind::LinkState,
            NotificationEvent::HdcpStateChanged { .. } => NotificationKind::HdcpState,
            NotificationEvent::CapabilityDescriptorUpdated { .. } => {
                NotificationKind::CapabilityDescriptor
            }
            NotificationEvent::StreamMuteChanged { .. } => NotificationKind::StreamMute,
            NotificationEvent::PacketTimeout(_) => NotificationKind::PacketTimeout,
        }
    }
}

/// Something observable happened inside the engine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    pub at: Timestamp,
    pub event: NotificationEvent,
}

impl Notification {
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        self.event.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_codes() {
        assert_eq!(NotificationKind::LinkState.to_code(), 1);
        assert_eq!(NotificationKind::HdcpState.to_code(), 2);
        assert_eq!(NotificationKind::CapabilityDescriptor.to_code(), 3);
        assert_eq!(NotificationKind::StreamMute.to_code(), 4);
        assert_eq!(NotificationKind::PacketTimeout.to_code(), 5);
    }

    #[test]
    fn test_timestamp_elapsed() {
        let at = Timestamp::new(250);
        assert_eq!(at.elapsed(Duration::from_millis(10)), Duration::from_millis(2500));
        assert_eq!(at.ticks_since(Timestamp::new(200)), 50);
        assert_eq!(Timestamp::new(1).ticks_since(at), 0);
        assert_eq!(Timestamp::default().next(), Timestamp::new(1));
    }

    #[test]
    fn test_event_kind() {
        let notification = Notification {
            at: Timestamp::new(3),
            event: NotificationEvent::PacketTimeout(PacketKind::Avi),
        };
        assert_eq!(notification.kind().to_code(), 5);
    }
}
