//! Per-interview session state and its store.
//!
//! A [`Session`] is mutated in place by the detectors. The
//! [`SessionStore`] hands out shared handles; creation is atomic with
//! lookup, and sessions of different interviews never share a lock.

use crate::core::event::{seconds_between, EventKey};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Mutable detector state for one interview.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    pub start_time: DateTime<Utc>,
    pub last_face_time: DateTime<Utc>,
    pub last_focus_time: DateTime<Utc>,
    pub is_currently_focused: bool,
    /// Start of the current unfocused streak; `Some` iff not focused
    pub focus_lost_at: Option<DateTime<Utc>>,
    /// Last emission time per cooldown key
    pub last_event_time: HashMap<EventKey, DateTime<Utc>>,
    pub consecutive_low_eye_ratio_frames: u32,
    /// Events emitted over the session's lifetime
    pub events_emitted: u64,
    /// Time of the most recent analyzed frame
    pub last_frame_time: Option<DateTime<Utc>>,
    /// Whether the timers run on the frames' clock yet
    clock_anchored: bool,
}

impl Session {
    /// Create a session with default state, started at `now`.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start_time: now,
            last_face_time: now,
            last_focus_time: now,
            is_currently_focused: true,
            focus_lost_at: None,
            last_event_time: HashMap::new(),
            consecutive_low_eye_ratio_frames: 0,
            events_emitted: 0,
            last_frame_time: None,
            clock_anchored: true,
        }
    }

    /// Create a session whose timers start at its first frame.
    ///
    /// Used when the session is opened before any frame has arrived and
    /// frames carry their own capture time, so `opened_at` is only a
    /// placeholder until [`Session::observe_frame`] runs.
    pub fn pending(id: impl Into<String>, opened_at: DateTime<Utc>) -> Self {
        Self {
            clock_anchored: false,
            ..Self::new(id, opened_at)
        }
    }

    /// Note a frame at `at`, anchoring the timers to it on the first frame
    /// of a pending session.
    pub fn observe_frame(&mut self, at: DateTime<Utc>) {
        if !self.clock_anchored {
            self.start_time = at;
            self.last_face_time = at;
            self.last_focus_time = at;
            self.clock_anchored = true;
        }
        self.last_frame_time = Some(at);
    }

    /// The session's own notion of "now": its latest frame, or its start.
    pub fn clock(&self) -> DateTime<Utc> {
        self.last_frame_time.unwrap_or(self.start_time)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Enter the unfocused state, starting the streak at `at`.
    pub fn mark_unfocused(&mut self, at: DateTime<Utc>) {
        self.is_currently_focused = false;
        self.focus_lost_at = Some(at);
    }

    /// Return to the focused state without touching `last_focus_time`.
    pub fn reset_focus(&mut self) {
        self.is_currently_focused = true;
        self.focus_lost_at = None;
    }

    /// Statistics for this session as of `now`.
    pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
        SessionStats {
            session_duration: seconds_between(self.start_time, now),
            last_face_seen: seconds_between(self.last_face_time, now),
            last_focused: seconds_between(self.last_focus_time, now),
            total_events: self.events_emitted,
            currently_focused: self.is_currently_focused,
        }
    }
}

/// Elapsed-time summary of a session, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_duration: f64,
    pub last_face_seen: f64,
    pub last_focused: f64,
    pub total_events: u64,
    pub currently_focused: bool,
}

/// Shared handle to one session.
pub type SharedSession = Arc<Mutex<Session>>;

/// Lock a session, recovering the state if a previous holder panicked.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Concurrent map of live sessions keyed by interview id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `id`, creating it with defaults if absent.
    pub fn get_or_create(&self, id: &str, now: DateTime<Utc>) -> SharedSession {
        if let Some(session) = self.get(id) {
            return session;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(interview_id = id, "created proctoring session");
                Arc::new(Mutex::new(Session::new(id, now)))
            })
            .clone()
    }

    /// Start a fresh session for `id`, replacing any existing state.
    pub fn start(&self, id: &str, now: DateTime<Utc>) -> SharedSession {
        self.insert(id, Session::new(id, now))
    }

    /// Open a fresh session for `id` whose timers start at its first frame.
    pub fn open(&self, id: &str, opened_at: DateTime<Utc>) -> SharedSession {
        self.insert(id, Session::pending(id, opened_at))
    }

    fn insert(&self, id: &str, session: Session) -> SharedSession {
        let session = Arc::new(Mutex::new(session));
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(id.to_string(), session.clone());
        tracing::info!(interview_id = id, "started proctoring session");
        session
    }

    /// Look up a session without creating it.
    pub fn get(&self, id: &str) -> Option<SharedSession> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(id).cloned()
    }

    /// Remove a session. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.remove(id).is_some();
        if removed {
            tracing::info!(interview_id = id, "ended proctoring session");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Any live session, for single-session tooling only.
    #[cfg(test)]
    pub(crate) fn first_id(&self) -> Option<String> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.keys().min().cloned()
    }
}
