use crate::events::publisher::{Event, EventPublisher};
use crate::models::strike::StrikeKind;
use crate::stores::recurring::RecurringOffenders;
use crate::stores::ttl_cache::TtlCache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Extra lifetime on top of the poll interval so counters survive between runs
pub const STRIKE_TTL_BUFFER: Duration = Duration::from_secs(2 * 60 * 60);

pub trait StrikeTracker: Send + Sync {
    /// Record one strike; true once the count has reached `max_strikes`.
    /// `max_strikes == 0` disables striking for the kind.
    fn strike_and_check_limit(&self, hash: &str, name: &str, max_strikes: u32, kind: StrikeKind) -> bool;

    fn reset_strike(&self, hash: &str, name: &str, kind: StrikeKind);

    /// Current count, 0 when absent or expired
    fn strike_count(&self, hash: &str, kind: StrikeKind) -> u32;
}

type StrikeKey = (StrikeKind, String);

/// Per-(kind, hash) strike counters with sliding expiry
pub struct Striker {
    strikes: TtlCache<StrikeKey, u32>,
    recurring: Arc<RecurringOffenders>,
    events: Arc<EventPublisher>,
    ttl: Duration,
}

impl Striker {
    pub fn new(
        poll_interval: Duration,
        recurring: Arc<RecurringOffenders>,
        events: Arc<EventPublisher>,
    ) -> Self {
        Self {
            strikes: TtlCache::new(),
            recurring,
            events,
            ttl: poll_interval + STRIKE_TTL_BUFFER,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn recurring(&self) -> &RecurringOffenders {
        &self.recurring
    }

    /// Drop expired counters; returns how many went away
    pub fn purge_expired(&self) -> usize {
        self.strikes.purge_expired()
    }

    fn key(hash: &str, kind: StrikeKind) -> StrikeKey {
        (kind, hash.to_ascii_lowercase())
    }
}

impl StrikeTracker for Striker {
    fn strike_and_check_limit(&self, hash: &str, name: &str, max_strikes: u32, kind: StrikeKind) -> bool {
        if max_strikes == 0 {
            debug!(hash = %hash, strike_kind = %kind, "Striking disabled");
            return false;
        }

        let count = self
            .strikes
            .update(Self::key(hash, kind), self.ttl, |current| current.map_or(1, |c| c + 1));

        self.events.publish(Event::StrikeIssued {
            hash: hash.to_string(),
            name: name.to_string(),
            kind,
            count,
            max_strikes,
        });

        if count > max_strikes {
            self.recurring.mark(hash);
            self.events.publish(Event::RecurringOffender {
                hash: hash.to_string(),
                name: name.to_string(),
                kind,
                count,
            });
        }

        count >= max_strikes
    }

    fn reset_strike(&self, hash: &str, name: &str, kind: StrikeKind) {
        if let Some(previous) = self.strikes.remove(&Self::key(hash, kind)) {
            info!(
                hash = %hash,
                name = %name,
                strike_kind = %kind,
                previous = previous,
                "Strikes reset"
            );
        }
    }

    fn strike_count(&self, hash: &str, kind: StrikeKind) -> u32 {
        self.strikes.get(&Self::key(hash, kind)).unwrap_or(0)
    }
}
