use std::collections::HashMap;
use std::sync::Arc;

use pulsar_core::AlertId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-alert async lock registry.
///
/// Serialises read-modify-write sequences against a single alert the way a
/// row lock would: the lifecycle service holds the lock across
/// "transition alert + cancel escalation", and the escalation tick holds
/// it across "reload alert + fire + advance", so a tick can never observe
/// a half-applied transition.
#[derive(Default)]
pub struct AlertLocks {
    inner: Mutex<HashMap<AlertId, Arc<Mutex<()>>>>,
}

impl AlertLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one alert, waiting if another task holds it.
    pub async fn lock(&self, id: AlertId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(id).or_default())
        };
        slot.lock_owned().await
    }

    /// Drop the slot for an alert that no longer exists. Safe to call while
    /// the lock is held elsewhere; the guard keeps its own `Arc`.
    pub async fn discard(&self, id: AlertId) {
        let mut map = self.inner.lock().await;
        map.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn lock_serialises_tasks() {
        let locks = Arc::new(AlertLocks::new());
        let id = AlertId::generate();
        let counter = Arc::new(Mutex::new(0u32));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(id).await;
                // Read-modify-write with a deliberate gap: without the alert
                // lock, concurrent tasks would lose updates.
                let before = *counter.lock().await;
                tokio::time::sleep(Duration::from_millis(1)).await;
                *counter.lock().await = before + 1;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*counter.lock().await, 8);
    }

    #[tokio::test]
    async fn different_alerts_do_not_contend() {
        let locks = AlertLocks::new();
        let a = locks.lock(AlertId::generate()).await;
        // A second alert's lock must be acquirable while the first is held.
        let b = locks.lock(AlertId::generate()).await;
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn discard_is_safe_while_held() {
        let locks = AlertLocks::new();
        let id = AlertId::generate();
        let guard = locks.lock(id).await;
        locks.discard(id).await;
        drop(guard);
        // Re-acquiring after discard creates a fresh slot.
        let _again = locks.lock(id).await;
    }
}
