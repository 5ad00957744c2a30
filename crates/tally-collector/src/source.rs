//! Event source: routes platform events to the collector listening on their message.
//!
//! A subscription goes through two steps. `subscribe` registers interest
//! immediately and buffers anything published for the message; `confirm`
//! hands the collector a channel and flushes the buffer into it, in order,
//! before any later event. Releasing happens exactly once, either through
//! [`Subscription::unsubscribe`] or when the guard is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tally_core::MessageId;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::CollectorError;
use crate::event::{Event, InboundEvent};

/// An event plus the instant the hub received it.
///
/// `received_at` orders events against collector timers: an event that
/// reached the hub after a deadline passed never beats that deadline.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub event: Event,
    pub received_at: Instant,
}

enum Route {
    /// Requested but not yet confirmed; events wait here.
    Pending { id: u64, buffer: Vec<Envelope> },
    Active {
        id: u64,
        tx: mpsc::UnboundedSender<Envelope>,
    },
}

impl Route {
    fn id(&self) -> u64 {
        match self {
            Route::Pending { id, .. } | Route::Active { id, .. } => *id,
        }
    }
}

struct HubInner {
    routes: DashMap<MessageId, Route>,
    next_id: AtomicU64,
}

/// Shared routing table from message id to the collector listening on it.
///
/// Cheap to clone; every clone points at the same table.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                routes: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Deliver a platform event. Returns `false` when nobody listens on its message.
    pub fn publish(&self, inbound: InboundEvent) -> bool {
        let InboundEvent {
            source_message_id,
            event,
        } = inbound;

        let Some(mut route) = self.inner.routes.get_mut(&source_message_id) else {
            return false;
        };

        let envelope = Envelope {
            event,
            received_at: Instant::now(),
        };

        match route.value_mut() {
            Route::Pending { buffer, .. } => {
                trace!(message_id = %source_message_id, "buffering event for unconfirmed subscription");
                buffer.push(envelope);
                true
            }
            // A closed receiver means the collector already ended; drop silently.
            Route::Active { tx, .. } => tx.send(envelope).is_ok(),
        }
    }

    /// Register interest in `target`. Events published from now on are kept
    /// until the returned subscription is confirmed or released.
    ///
    /// A second subscription on the same message replaces the first.
    pub fn subscribe(&self, target: MessageId) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let previous = self.inner.routes.insert(
            target,
            Route::Pending {
                id,
                buffer: Vec::new(),
            },
        );
        if previous.is_some() {
            debug!(message_id = %target, "subscription replaced an existing route");
        }
        Subscription {
            hub: self.clone(),
            target,
            id,
            released: false,
        }
    }

    /// True while some subscription (pending or confirmed) exists for `target`.
    pub fn is_listening(&self, target: MessageId) -> bool {
        self.inner.routes.contains_key(&target)
    }

    /// Number of messages currently routed.
    pub fn len(&self) -> usize {
        self.inner.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.routes.is_empty()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped ownership of one route in the hub. Released exactly once.
pub struct Subscription {
    hub: EventHub,
    target: MessageId,
    id: u64,
    released: bool,
}

impl Subscription {
    /// Switch the route to live delivery and flush everything buffered so far.
    ///
    /// The flush runs under the route's lock, so a concurrent `publish` lands
    /// after the buffered events.
    pub fn confirm(&mut self) -> Result<mpsc::UnboundedReceiver<Envelope>, CollectorError> {
        if self.released {
            return Err(CollectorError::SourceClosed);
        }
        let mut route = match self.hub.inner.routes.get_mut(&self.target) {
            Some(r) if r.id() == self.id => r,
            _ => return Err(CollectorError::SourceClosed),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let previous = std::mem::replace(
            route.value_mut(),
            Route::Active {
                id: self.id,
                tx: tx.clone(),
            },
        );
        if let Route::Pending { buffer, .. } = previous {
            if !buffer.is_empty() {
                debug!(message_id = %self.target, count = buffer.len(), "flushing buffered events");
            }
            for envelope in buffer {
                // rx is alive right here, so this cannot fail.
                let _ = tx.send(envelope);
            }
        }
        Ok(rx)
    }

    /// Release the route. Consumes the guard, so it can only happen once.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let id = self.id;
        // Only remove our own route; a newer subscription may have replaced it.
        let removed = self
            .hub
            .inner
            .routes
            .remove_if(&self.target, |_, route| route.id() == id);
        if removed.is_some() {
            debug!(message_id = %self.target, "subscription released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::ActorId;

    fn inbound(msg: u64, payload: &str) -> InboundEvent {
        InboundEvent::new(MessageId(msg), Event::reaction_add(ActorId(1), payload))
    }

    #[tokio::test]
    async fn unrouted_events_are_dropped() {
        let hub = EventHub::new();
        assert!(!hub.publish(inbound(1, "a")));
    }

    #[tokio::test]
    async fn events_before_confirm_are_flushed_in_order() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe(MessageId(1));
        assert!(hub.publish(inbound(1, "a")));
        assert!(hub.publish(inbound(1, "b")));

        let mut rx = sub.confirm().unwrap();
        assert!(hub.publish(inbound(1, "c")));

        let got: Vec<String> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .into_iter()
        .map(|e| e.event.payload)
        .collect();
        assert_eq!(got, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn other_messages_do_not_leak() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe(MessageId(1));
        let mut rx = sub.confirm().unwrap();
        assert!(!hub.publish(inbound(2, "x")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_route() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe(MessageId(1));
        let mut rx = sub.confirm().unwrap();
        sub.unsubscribe();

        assert!(!hub.is_listening(MessageId(1)));
        assert!(!hub.publish(inbound(1, "late")));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn dropping_an_unconfirmed_subscription_releases_it() {
        let hub = EventHub::new();
        {
            let _sub = hub.subscribe(MessageId(1));
            assert!(hub.is_listening(MessageId(1)));
        }
        assert!(hub.is_empty());
    }

    #[test]
    fn stale_release_keeps_the_newer_route() {
        let hub = EventHub::new();
        let old = hub.subscribe(MessageId(1));
        let mut new = hub.subscribe(MessageId(1));
        old.unsubscribe();

        assert!(hub.is_listening(MessageId(1)));
        assert!(new.confirm().is_ok());
    }

    #[test]
    fn replaced_subscription_cannot_confirm() {
        let hub = EventHub::new();
        let mut old = hub.subscribe(MessageId(1));
        let _new = hub.subscribe(MessageId(1));
        assert!(matches!(old.confirm(), Err(CollectorError::SourceClosed)));
    }
}
