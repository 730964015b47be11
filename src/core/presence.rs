//! Face presence and face count checks.

use crate::core::event::{seconds_between, EventKind, ProctorEvent};
use crate::core::gate::EventGate;
use crate::core::session::Session;
use chrono::{DateTime, Duration, Utc};

/// Tracks how long the candidate's face has been out of frame.
#[derive(Debug, Clone, Copy)]
pub struct PresenceMonitor {
    timeout: Duration,
}

impl PresenceMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Apply one frame's presence signal.
    ///
    /// A frame without a face also forces focus back on and clears the
    /// eye-closure counter: neither can be observed without a face.
    pub fn update(
        &self,
        session: &mut Session,
        gate: &EventGate,
        face_present: bool,
        at: DateTime<Utc>,
    ) -> Option<ProctorEvent> {
        if face_present {
            session.last_face_time = at;
            return None;
        }

        let missing_for = at - session.last_face_time;
        let event = if missing_for > self.timeout
            && gate.try_emit(session, EventKind::FaceMissing.into(), at)
        {
            let duration = seconds_between(session.last_face_time, at);
            tracing::info!(interview_id = session.id(), duration, "face missing alert");
            Some(ProctorEvent::face_missing(session.id(), duration, at))
        } else {
            None
        };

        session.reset_focus();
        session.consecutive_low_eye_ratio_frames = 0;

        event
    }
}

/// Flags frames with more than one face.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiSubjectDetector;

impl MultiSubjectDetector {
    pub fn check(
        &self,
        session: &mut Session,
        gate: &EventGate,
        face_count: usize,
        at: DateTime<Utc>,
    ) -> Option<ProctorEvent> {
        if face_count > 1 && gate.try_emit(session, EventKind::MultipleFaces.into(), at) {
            tracing::info!(interview_id = session.id(), face_count, "multiple faces alert");
            Some(ProctorEvent::multiple_faces(session.id(), face_count, at))
        } else {
            None
        }
    }
}
