use std::time::Duration;

use tokio::{
    select,
    sync::{
        mpsc::{self, Sender, error::TrySendError},
        watch,
    },
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    Event, Notification, PortSnapshot, Receiver, ReceiverConfig,
    traits::{Hardware, NotificationSink, Upstream},
};

const EVENT_CHANNEL_SIZE: usize = 16;
const NOTIFICATION_CHANNEL_SIZE: usize = 64;

/// Forwards notifications to the driver handle without ever blocking the
/// engine.
#[derive(Debug)]
pub(super) struct ChannelSink {
    sender: Sender<Notification>,
}

impl NotificationSink for ChannelSink {
    fn notify(&mut self, notification: Notification) {
        match self.sender.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(notification)) => {
                warn!(
                    "Notification channel full, dropping kind {} notification",
                    notification.kind().to_code()
                );
            }
            // Nobody listens any more
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

pub(super) struct Channels {
    pub(super) events: Sender<Event>,
    pub(super) notifications: mpsc::Receiver<Notification>,
    pub(super) snapshots: watch::Receiver<PortSnapshot>,
}

#[derive(Debug)]
pub(super) struct Inner<H, U> {
    /// The engine, owned by the task
    receiver: Receiver<H, U, ChannelSink>,
    /// Events from the driver handle
    event_receiver: mpsc::Receiver<Event>,
    /// Latest snapshot, replaced after every handled event
    snapshot_sender: watch::Sender<PortSnapshot>,
    tick_period: Duration,
}

impl<H, U> Inner<H, U>
where
    H: Hardware + Send + 'static,
    U: Upstream + Send + 'static,
{
    pub fn spawn(config: ReceiverConfig, hardware: H, upstream: U) -> Channels {
        info!("Starting HDMI receiver driver on {}", config.port);
        let (event_sender, event_receiver) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (notification_sender, notification_receiver) =
            mpsc::channel(NOTIFICATION_CHANNEL_SIZE);
        let tick_period = config.tick_period;
        let receiver = Receiver::new(
            config,
            hardware,
            upstream,
            ChannelSink {
                sender: notification_sender,
            },
        );
        let (snapshot_sender, snapshot_receiver) = watch::channel(receiver.snapshot());
        let inner = Self {
            receiver,
            event_receiver,
            snapshot_sender,
            tick_period,
        };
        tokio::spawn(inner.run());
        Channels {
            events: event_sender,
            notifications: notification_receiver,
            snapshots: snapshot_receiver,
        }
    }

    async fn run(mut self) {
        let mut interval = time::interval(self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            select! {
                _ = interval.tick() => {
                    self.receiver.handle(Event::Tick);
                }
                event = self.event_receiver.recv() => {
                    let Some(event) = event else {
                        // The driver handle has been dropped, so we should exit
                        info!("Event channel closed, stopping HDMI receiver driver");
                        break;
                    };
                    debug!("Handling {:?}", event);
                    self.receiver.handle(event);
                }
            }
            self.snapshot_sender.send_replace(self.receiver.snapshot());
        }
    }
}
