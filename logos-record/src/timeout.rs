//! Acknowledgment deadlines for outbound requests.
//!
//! ```text
//! register(R, US, "doc", AckTimeout, 2s) ──► pending[(R, US, "doc")] = deadline
//!                                                 │
//!              ACK "US" "doc" ── clear ───────────┤
//!                                                 ▼
//!              expire(now) ── deadline passed ──► ErrorChannel::report_error
//! ```
//!
//! Deadlines use the monotonic clock. Every registration gets a fresh token,
//! so re-registering a key replaces the old deadline and clearing is always
//! idempotent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::ErrorChannel;
use crate::protocol::{Action, Event, Message, Topic};

/// Contract the record core uses to guard its requests.
pub trait AckTimeouts: Send + Sync {
    /// Start a deadline for `(topic, action, name)`, signalling `event` if it elapses.
    fn register(&self, topic: Topic, action: Action, name: &str, event: Event, timeout: Duration);

    /// Cancel the deadline for `(topic, action, name)`. No-op if none is pending.
    fn clear(&self, topic: Topic, action: Action, name: &str);

    /// Cancel the deadline an inbound message answers.
    ///
    /// Acks answer the action named in `data[0]`; other messages answer their own action.
    fn clear_message(&self, message: &Message) {
        let action = match message.action {
            Action::Ack => match message.field(0).and_then(Action::from_code) {
                Ok(action) => action,
                Err(e) => {
                    log::debug!("Ack without a valid action: {e}");
                    return;
                }
            },
            other => other,
        };
        if let Some(name) = message.record_name() {
            self.clear(message.topic, action, name);
        }
    }
}

/// Key of a pending deadline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeoutKey {
    pub topic: Topic,
    pub action: Action,
    pub name: String,
}

#[derive(Debug, Clone)]
struct PendingTimeout {
    token: u64,
    event: Event,
    deadline: Instant,
}

/// Deadline registry driven by [`expire`](AckTimeoutRegistry::expire).
pub struct AckTimeoutRegistry {
    pending: Mutex<HashMap<TimeoutKey, PendingTimeout>>,
    next_token: AtomicU64,
    errors: Arc<dyn ErrorChannel>,
}

impl AckTimeoutRegistry {
    pub fn new(errors: Arc<dyn ErrorChannel>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            errors,
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<TimeoutKey, PendingTimeout>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register with an explicit start instant, returning the registration token.
    pub fn register_at(
        &self,
        key: TimeoutKey,
        event: Event,
        timeout: Duration,
        now: Instant,
    ) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.pending().insert(
            key,
            PendingTimeout {
                token,
                event,
                deadline: now + timeout,
            },
        );
        token
    }

    /// Cancel a registration only if it is still the one identified by `token`.
    pub fn cancel(&self, key: &TimeoutKey, token: u64) -> bool {
        let mut pending = self.pending();
        match pending.get(key) {
            Some(entry) if entry.token == token => {
                pending.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Whether a deadline is pending for `(topic, action, name)`.
    pub fn is_pending(&self, topic: Topic, action: Action, name: &str) -> bool {
        let key = TimeoutKey {
            topic,
            action,
            name: name.to_string(),
        };
        self.pending().contains_key(&key)
    }

    /// Number of pending deadlines.
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Fire every deadline at or before `now`. Returns how many fired.
    pub fn expire(&self, now: Instant) -> usize {
        let expired: Vec<(TimeoutKey, PendingTimeout)> = {
            let mut pending = self.pending();
            let due: Vec<TimeoutKey> = pending
                .iter()
                .filter(|(_, entry)| entry.deadline <= now)
                .map(|(key, _)| key.clone())
                .collect();
            due.into_iter()
                .filter_map(|key| pending.remove(&key).map(|entry| (key, entry)))
                .collect()
        };

        // Reported outside the lock
        for (key, entry) in &expired {
            let message = format!(
                "No message received in time for {} {}",
                key.action.code(),
                key.name
            );
            log::error!("{}: {message}", entry.event.marker());
            self.errors.report_error(key.topic, entry.event, &message);
        }
        expired.len()
    }

    /// Spawn a tokio task that calls [`expire`](Self::expire) every `period`.
    pub fn spawn_expiry(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match registry.upgrade() {
                    Some(registry) => {
                        registry.expire(Instant::now());
                    }
                    None => break,
                }
            }
        })
    }
}

impl AckTimeouts for AckTimeoutRegistry {
    fn register(&self, topic: Topic, action: Action, name: &str, event: Event, timeout: Duration) {
        let key = TimeoutKey {
            topic,
            action,
            name: name.to_string(),
        };
        self.register_at(key, event, timeout, Instant::now());
    }

    fn clear(&self, topic: Topic, action: Action, name: &str) {
        let key = TimeoutKey {
            topic,
            action,
            name: name.to_string(),
        };
        self.pending().remove(&key);
    }
}
