//! Cooldown-based deduplication of events.

use crate::core::event::EventKey;
use crate::core::session::Session;
use chrono::{DateTime, Duration, Utc};

/// Rate-limits emission per event key per session.
///
/// `admit` never records; the detector that actually emits calls `record`.
#[derive(Debug, Clone, Copy)]
pub struct EventGate {
    cooldown: Duration,
}

impl EventGate {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Whether an event under `key` may be emitted for `session` at `at`.
    pub fn admit(&self, session: &Session, key: &EventKey, at: DateTime<Utc>) -> bool {
        match session.last_event_time.get(key) {
            Some(last) => at - *last >= self.cooldown,
            None => true,
        }
    }

    /// Record an emission. Timestamps per key never move backwards.
    pub fn record(&self, session: &mut Session, key: EventKey, at: DateTime<Utc>) {
        let last = session.last_event_time.entry(key).or_insert(at);
        if at > *last {
            *last = at;
        }
        session.events_emitted += 1;
    }

    /// Admit and, if admitted, record in one step.
    pub fn try_emit(&self, session: &mut Session, key: EventKey, at: DateTime<Utc>) -> bool {
        if self.admit(session, &key, at) {
            self.record(session, key, at);
            true
        } else {
            tracing::debug!(
                interview_id = session.id(),
                key = %key,
                "event suppressed by cooldown"
            );
            false
        }
    }
}

impl Default for EventGate {
    fn default() -> Self {
        Self::new(Duration::seconds(3))
    }
}
