//! Shared application state for the emma-server.
//!
//! [`AppState`] is the state container passed (as `Arc<AppState>`) to the
//! webhook handler and to every background event task. Apart from
//! [`SeenEvents`], everything in it is read-only after startup.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::notifier::Notifier;
use crate::responder::Responder;

/// Shared application state, passed as `Arc<AppState>` to all handlers.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use emma_server::responder::CannedResponder;
/// use emma_server::slack_client::SlackClient;
/// use emma_server::state::AppState;
///
/// let state = AppState::new(
///     Arc::new(SlackClient::new("xoxb-test".into())),
///     Arc::new(CannedResponder),
///     "UBOT".into(),
///     Duration::from_secs(600),
/// );
/// assert!(state.is_self("UBOT"));
/// ```
pub struct AppState {
    notifier: Arc<dyn Notifier>,
    responder: Arc<dyn Responder>,
    bot_user_id: String,
    seen_events: SeenEvents,
}

impl AppState {
    /// Creates a new application state with the given components.
    pub fn new(
        notifier: Arc<dyn Notifier>,
        responder: Arc<dyn Responder>,
        bot_user_id: String,
        dedup_ttl: Duration,
    ) -> Self {
        Self {
            notifier,
            responder,
            bot_user_id,
            seen_events: SeenEvents::new(dedup_ttl),
        }
    }

    /// Returns the outbound reply channel.
    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Returns the reply generator.
    pub fn responder(&self) -> &dyn Responder {
        self.responder.as_ref()
    }

    /// Returns `true` if `user` is the bot itself.
    pub fn is_self(&self, user: &str) -> bool {
        user == self.bot_user_id
    }

    /// Returns the delivery deduplication set.
    pub fn seen_events(&self) -> &SeenEvents {
        &self.seen_events
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("bot_user_id", &self.bot_user_id)
            .field("seen_events", &self.seen_events)
            .finish_non_exhaustive()
    }
}

/// Remembers recently scheduled `event_id`s so Slack's retries of the same
/// delivery are not answered twice.
///
/// An id older than the TTL counts as new again when it is seen. Expired
/// entries are swept from the map once every [`PRUNE_EVERY`] new ids rather
/// than on each call. A zero TTL disables deduplication.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use emma_server::state::SeenEvents;
///
/// let seen = SeenEvents::new(Duration::from_secs(60));
/// assert!(seen.check_and_insert("Ev1"));
/// assert!(!seen.check_and_insert("Ev1"));
/// assert!(seen.check_and_insert("Ev2"));
/// ```
#[derive(Debug)]
pub struct SeenEvents {
    ttl: Duration,
    prune_every: usize,
    inserts: AtomicUsize,
    seen: DashMap<String, Instant>,
}

/// Number of newly recorded ids between two sweeps of expired entries.
pub const PRUNE_EVERY: usize = 64;

impl SeenEvents {
    /// Creates an empty set with the given retention window.
    pub fn new(ttl: Duration) -> Self {
        Self::with_prune_every(ttl, PRUNE_EVERY)
    }

    fn with_prune_every(ttl: Duration, prune_every: usize) -> Self {
        Self {
            ttl,
            prune_every: prune_every.max(1),
            inserts: AtomicUsize::new(0),
            seen: DashMap::new(),
        }
    }

    /// Records `event_id` and returns `true` if it was not seen within the TTL.
    pub fn check_and_insert(&self, event_id: &str) -> bool {
        if self.ttl.is_zero() {
            return true;
        }
        let now = Instant::now();

        let fresh = match self.seen.entry(event_id.to_string()) {
            Entry::Occupied(mut slot) => {
                if now.duration_since(*slot.get()) < self.ttl {
                    false
                } else {
                    slot.insert(now);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        };

        // The entry guard is released above; retain locks every shard
        if fresh && (self.inserts.fetch_add(1, Ordering::Relaxed) + 1) % self.prune_every == 0 {
            self.prune(now);
        }
        fresh
    }

    /// Number of ids currently remembered.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if no ids are remembered.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn prune(&self, now: Instant) {
        let before = self.seen.len();
        self.seen
            .retain(|_, first_seen| now.duration_since(*first_seen) < self.ttl);
        let dropped = before.saturating_sub(self.seen.len());
        if dropped > 0 {
            debug!(dropped, "Pruned expired event ids");
        }
    }
}
