//! In-process topic-keyed event broadcaster.
//!
//! Publishers enqueue [`EventEnvelope`]s; subscribers are
//! organization-scoped and receive them over bounded channels. Delivery is
//! best-effort and fire-and-forget: a subscriber whose buffer is full is
//! dropped (disconnected) rather than applying backpressure to the
//! publisher. The primary consumer is the WebSocket presenter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use pulsar_core::{EventEnvelope, OrgId};

/// Default per-subscriber buffer capacity.
pub const DEFAULT_BUFFER: usize = 64;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<EventEnvelope>,
}

/// The broadcaster hub.
///
/// The organization → subscribers map sits behind a read/write mutex:
/// register/unregister are infrequent writes, broadcasts are hot reads.
pub struct EventBus {
    subscribers: RwLock<HashMap<OrgId, Vec<Subscriber>>>,
    buffer: usize,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer capacity.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a subscriber for one organization's events.
    pub fn subscribe(self: &Arc<Self>, org: OrgId) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .expect("bus lock poisoned")
            .entry(org)
            .or_default()
            .push(Subscriber { id, tx });
        debug!(org_id = %org, subscriber = id, "bus subscriber registered");
        Subscription {
            id,
            org,
            rx,
            bus: Arc::downgrade(self),
        }
    }

    /// Publish an envelope to every subscriber of its organization.
    ///
    /// Never blocks. Subscribers whose buffers are full are disconnected.
    pub fn publish(&self, envelope: &EventEnvelope) {
        let mut dead: Vec<u64> = Vec::new();
        {
            let map = self.subscribers.read().expect("bus lock poisoned");
            let Some(subs) = map.get(&envelope.organization_id) else {
                return;
            };
            for sub in subs {
                match sub.tx.try_send(envelope.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(
                            org_id = %envelope.organization_id,
                            subscriber = sub.id,
                            "bus subscriber buffer full, disconnecting"
                        );
                        dead.push(sub.id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dead.push(sub.id);
                    }
                }
            }
        }
        if !dead.is_empty() {
            self.remove(envelope.organization_id, &dead);
        }
    }

    /// Number of live subscribers for an organization.
    #[must_use]
    pub fn subscriber_count(&self, org: OrgId) -> usize {
        self.subscribers
            .read()
            .expect("bus lock poisoned")
            .get(&org)
            .map_or(0, Vec::len)
    }

    fn remove(&self, org: OrgId, ids: &[u64]) {
        let mut map = self.subscribers.write().expect("bus lock poisoned");
        let now_empty = match map.get_mut(&org) {
            Some(subs) => {
                subs.retain(|s| !ids.contains(&s.id));
                subs.is_empty()
            }
            None => false,
        };
        if now_empty {
            map.remove(&org);
        }
    }
}

/// A live subscription. Dropping it unregisters from the hub.
pub struct Subscription {
    id: u64,
    org: OrgId,
    rx: mpsc::Receiver<EventEnvelope>,
    bus: std::sync::Weak<EventBus>,
}

impl Subscription {
    /// Receive the next envelope; `None` when disconnected.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.rx.recv().await
    }

    /// The organization this subscription is scoped to.
    #[must_use]
    pub const fn org(&self) -> OrgId {
        self.org
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.org, &[self.id]);
        }
    }
}
