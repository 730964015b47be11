//! Hysteresis state machine over the per-frame "looking at screen" signal.
//!
//! ```text
//!            signal = false                 signal = false, streak > timeout
//!  Focused ─────────────────▶ Unfocused ─────────────────────────▶ focus_lost
//!     ▲                          │                                (via gate)
//!     └──────────────────────────┘
//!            signal = true
//! ```

use crate::core::event::{seconds_between, EventKind, ProctorEvent};
use crate::core::gate::EventGate;
use crate::core::session::Session;
use chrono::{DateTime, Duration, Utc};

/// Tracks attention continuity for the primary subject.
#[derive(Debug, Clone, Copy)]
pub struct FocusTracker {
    timeout: Duration,
}

impl FocusTracker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Apply one frame's focus signal.
    pub fn update(
        &self,
        session: &mut Session,
        gate: &EventGate,
        focused: bool,
        at: DateTime<Utc>,
    ) -> Option<ProctorEvent> {
        match (session.is_currently_focused, focused) {
            (true, true) => {
                session.last_focus_time = at;
                None
            }
            (true, false) => {
                tracing::debug!(interview_id = session.id(), "focus lost, starting timer");
                session.mark_unfocused(at);
                None
            }
            (false, true) => {
                tracing::debug!(interview_id = session.id(), "focus regained");
                session.reset_focus();
                session.last_focus_time = at;
                None
            }
            (false, false) => {
                let Some(lost_at) = session.focus_lost_at else {
                    session.mark_unfocused(at);
                    return None;
                };

                if at - lost_at > self.timeout
                    && gate.try_emit(session, EventKind::FocusLost.into(), at)
                {
                    let duration = seconds_between(lost_at, at);
                    tracing::info!(interview_id = session.id(), duration, "focus lost alert");
                    Some(ProctorEvent::focus_lost(session.id(), duration, at))
                } else {
                    None
                }
            }
        }
    }
}
