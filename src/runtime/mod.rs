//! A tokio task that drives a [`Receiver`](crate::Receiver) on its tick
//! period.
//!
//! The engine lives entirely inside the task. The [`Driver`] handle talks to
//! it through three channels: events in, notifications out, and a `watch`
//! channel that always holds the latest [`PortSnapshot`].

mod inner;

use inner::Inner;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::{
    Error, Event, Notification, PortSnapshot, ReceiverConfig,
    traits::{Hardware, Upstream},
};

#[derive(Debug)]
pub struct Driver {
    event_sender: mpsc::Sender<Event>,
    notification_receiver: mpsc::Receiver<Notification>,
    snapshot_receiver: watch::Receiver<PortSnapshot>,
}

impl Driver {
    /// Move the collaborators into a new task and start ticking.
    ///
    /// # Panics
    /// - if called outside a tokio runtime
    pub fn spawn<H, U>(config: ReceiverConfig, hardware: H, upstream: U) -> Self
    where
        H: Hardware + Send + 'static,
        U: Upstream + Send + 'static,
    {
        let channels = Inner::spawn(config, hardware, upstream);
        Self {
            event_sender: channels.events,
            notification_receiver: channels.notifications,
            snapshot_receiver: channels.snapshots,
        }
    }

    /// Queue an event for the engine.
    ///
    /// # Errors
    /// - if the driver task has stopped
    pub async fn send(&self, event: Event) -> Result<(), Error> {
        self.event_sender
            .send(event)
            .await
            .map_err(|_| Error::DriverClosed)
    }

    /// Wait for the next notification. `None` once the task has stopped and
    /// every queued notification was consumed.
    pub async fn next_notification(&mut self) -> Option<Notification> {
        self.notification_receiver.recv().await
    }

    /// The state after the most recently handled event or tick.
    #[must_use]
    pub fn snapshot(&self) -> PortSnapshot {
        self.snapshot_receiver.borrow().clone()
    }

    /// A receiver that is notified on every snapshot update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PortSnapshot> {
        self.snapshot_receiver.clone()
    }

    /// Stop the task and drain the remaining notifications.
    pub async fn shut_down(self) -> Vec<Notification> {
        let Self {
            event_sender,
            mut notification_receiver,
            ..
        } = self;
        drop(event_sender);
        info!("Shutting down HDMI receiver driver");
        let mut remaining = Vec::new();
        while let Some(notification) = notification_receiver.recv().await {
            remaining.push(notification);
        }
        remaining
    }
}
