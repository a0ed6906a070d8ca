use crate::error::BookingError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-event mutual exclusion. Operations that read booking counts and then
/// write a decision hold the event's lock across both steps; operations on
/// different events never contend.
pub struct EventLockRegistry {
    /// Event id → its lock.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    timeout: Duration,
    acquired: AtomicU64,
    released: Arc<AtomicU64>,
}

/// Held for the duration of one locked operation. Dropping the guard releases
/// the event lock, including on every early-return error path.
pub struct EventLockGuard {
    _inner: OwnedMutexGuard<()>,
    released: Arc<AtomicU64>,
}

impl Drop for EventLockGuard {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl EventLockRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
            acquired: AtomicU64::new(0),
            released: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquires the lock for one event, waiting at most the configured
    /// timeout. Times out with a retryable error rather than hanging.
    pub async fn lock(&self, event_id: &str) -> Result<EventLockGuard, BookingError> {
        let entry = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(event_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let inner = tokio::time::timeout(self.timeout, entry.lock_owned())
            .await
            .map_err(|_| BookingError::LockTimeout(event_id.to_string()))?;

        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(EventLockGuard {
            _inner: inner,
            released: Arc::clone(&self.released),
        })
    }

    pub fn acquired_count(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

impl Default for EventLockRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}
