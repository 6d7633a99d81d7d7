//! Fan-out of committed cart changes to observers.
//!
//! The store publishes one [`CartEvent`] per committed change, always in
//! revision order. Observers either take a raw receiver through
//! [`EventBus::subscribe`] or a [`CartSubscription`], which pairs the
//! receiver with the revision the observer has already seen so that events
//! older than a snapshot are never delivered twice.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::CartEvent;

/// Broadcast bus for [`CartEvent`]s.
///
/// Slow receivers lose the oldest events once `capacity` are buffered and
/// are told how many they missed.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CartEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per receiver. Zero is
    /// raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes `event` and returns how many receivers got it. With no
    /// receivers the event is dropped.
    pub fn publish(&self, event: CartEvent) -> usize {
        let revision = event.revision();
        let event_type = event.event_type_str();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::trace!(revision, event_type, delivered, "cart event published");
        delivered
    }

    /// Raw receiver for every future event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.sender.subscribe()
    }

    /// Revision-aware receiver for every future event.
    #[must_use]
    pub fn subscription(&self) -> CartSubscription {
        CartSubscription {
            rx: self.sender.subscribe(),
            seen: 0,
        }
    }

    /// Number of live receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// What a [`CartSubscription`] yields next.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// An event newer than anything seen so far.
    Event(CartEvent),
    /// `missed` events were dropped; the observer should resynchronize from
    /// a fresh snapshot.
    Lagged(u64),
    /// The bus is gone.
    Closed,
}

/// Receiver that drops events at or below the last revision the observer
/// has seen.
///
/// Subscribe before taking a snapshot, then call
/// [`CartSubscription::seen_through`] with the snapshot's revision: changes
/// committed in between are covered by the snapshot and are skipped, later
/// ones are delivered.
#[derive(Debug)]
pub struct CartSubscription {
    rx: broadcast::Receiver<CartEvent>,
    seen: u64,
}

impl CartSubscription {
    /// Marks everything up to `revision` as seen. Never moves backwards.
    pub fn seen_through(&mut self, revision: u64) {
        self.seen = self.seen.max(revision);
    }

    /// Highest revision seen so far.
    #[must_use]
    pub const fn seen(&self) -> u64 {
        self.seen
    }

    /// Waits for the next unseen event.
    pub async fn next(&mut self) -> Delivery {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.revision() <= self.seen => {}
                Ok(event) => {
                    self.seen = event.revision();
                    return Delivery::Event(event);
                }
                Err(RecvError::Lagged(missed)) => return Delivery::Lagged(missed),
                Err(RecvError::Closed) => return Delivery::Closed,
            }
        }
    }
}
