//! Write path from committed cart state to the key-value backend.
//!
//! Two modes are supported. In [`PersistMode::Durable`] the caller awaits
//! [`write_with_retry`] before the mutation commits. In
//! [`PersistMode::Background`] a single [`BackgroundPersister`] task owns
//! all writes: mutations drop their serialized cart into a latest-value
//! channel and the task writes whatever is newest, so a burst of mutations
//! collapses into one write and an older cart never overwrites a newer one.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::CartError;
use crate::persistence::KeyValueStore;

/// How mutations reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    /// The mutation awaits its write and only commits once it succeeded.
    Durable,
    /// The mutation commits immediately; a background task writes later.
    Background,
}

impl FromStr for PersistMode {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "durable" | "sync" => Ok(Self::Durable),
            "background" | "async" => Ok(Self::Background),
            other => Err(CartError::Config(format!(
                "unknown persist mode {other:?} (expected durable or background)"
            ))),
        }
    }
}

/// Exponential backoff for failed writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first failure. Zero disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based): the initial backoff
    /// doubled `retry` times, capped at `max_backoff`.
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Writes `value` under `key`, retrying failures according to `policy`.
///
/// # Errors
///
/// Returns the backend's last error once the retry budget is spent.
pub async fn write_with_retry(
    storage: &dyn KeyValueStore,
    key: &str,
    value: &str,
    policy: &RetryPolicy,
) -> Result<(), CartError> {
    let mut retry = 0;
    loop {
        match storage.set(key, value).await {
            Ok(()) => return Ok(()),
            Err(err) if retry < policy.max_retries => {
                let delay = policy.backoff_for(retry);
                tracing::warn!(
                    backend = storage.backend_name(),
                    attempt = retry + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "cart write failed; retrying"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Serialized cart tagged with the revision it was taken at.
#[derive(Debug, Clone)]
struct PendingWrite {
    revision: u64,
    json: String,
}

/// Single task that writes the newest submitted cart.
#[derive(Debug)]
pub struct BackgroundPersister {
    pending: watch::Sender<Option<PendingWrite>>,
    settled: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl BackgroundPersister {
    /// Spawns the writer task on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(storage: Arc<dyn KeyValueStore>, key: String, policy: RetryPolicy) -> Self {
        let (pending, mut pending_rx) = watch::channel::<Option<PendingWrite>>(None);
        let (settled_tx, settled) = watch::channel(0u64);

        let task = tokio::spawn(async move {
            // Keeps draining after the store is dropped: `changed` still
            // reports a value that was never seen.
            while pending_rx.changed().await.is_ok() {
                let Some(write) = pending_rx.borrow_and_update().clone() else {
                    continue;
                };
                match write_with_retry(storage.as_ref(), &key, &write.json, &policy).await {
                    Ok(()) => tracing::debug!(revision = write.revision, "cart persisted"),
                    Err(err) => tracing::error!(
                        revision = write.revision,
                        error = %err,
                        "giving up on cart write"
                    ),
                }
                settled_tx.send_replace(write.revision);
            }
        });

        Self {
            pending,
            settled,
            task,
        }
    }

    /// Hands the cart at `revision` to the writer, replacing any cart that
    /// has not been picked up yet.
    pub fn submit(&self, revision: u64, json: String) {
        self.pending
            .send_replace(Some(PendingWrite { revision, json }));
    }

    /// Waits until the most recently submitted cart has been written or
    /// given up on.
    pub async fn flush(&self) {
        let target = match &*self.pending.borrow() {
            Some(write) => write.revision,
            None => return,
        };
        let mut settled = self.settled.clone();
        if settled.wait_for(|revision| *revision >= target).await.is_err() {
            tracing::warn!(target, "cart writer stopped before flush completed");
        }
    }

    /// Returns `true` once the writer task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(300),
        };
        assert_eq!(policy.backoff_for(0), Duration::from_millis(50));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(300));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(300));
    }

    #[test]
    fn persist_mode_parses() {
        assert_eq!("durable".parse::<PersistMode>().ok(), Some(PersistMode::Durable));
        assert_eq!(
            "Background".parse::<PersistMode>().ok(),
            Some(PersistMode::Background)
        );
        assert!("eventually".parse::<PersistMode>().is_err());
    }

    #[tokio::test]
    async fn background_writer_keeps_only_newest_cart() {
        let storage = Arc::new(MemoryStore::new());
        let persister = BackgroundPersister::spawn(
            Arc::clone(&storage) as Arc<dyn KeyValueStore>,
            "cart".to_string(),
            RetryPolicy::no_retry(),
        );
        for revision in 1..=20u64 {
            persister.submit(revision, format!("[{revision}]"));
        }
        persister.flush().await;

        let Ok(Some(value)) = storage.get("cart").await else {
            panic!("expected persisted cart");
        };
        assert_eq!(value, "[20]");
        assert!(!persister.is_finished());
    }

    #[tokio::test]
    async fn flush_without_submissions_returns_immediately() {
        let persister = BackgroundPersister::spawn(
            Arc::new(MemoryStore::new()),
            "cart".to_string(),
            RetryPolicy::default(),
        );
        persister.flush().await;
    }
}
