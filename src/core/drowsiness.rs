//! Consecutive-frame confirmation of eye closure.

use crate::core::event::{EventKind, ProctorEvent};
use crate::core::gate::EventGate;
use crate::core::session::Session;
use chrono::{DateTime, Utc};

/// Declares drowsiness once the eye ratio stays below threshold for
/// `confirm_frames` consecutive frames.
#[derive(Debug, Clone, Copy)]
pub struct DrowsinessDetector {
    threshold: f64,
    confirm_frames: u32,
}

impl DrowsinessDetector {
    pub fn new(threshold: f64, confirm_frames: u32) -> Self {
        Self {
            threshold,
            confirm_frames,
        }
    }

    /// Apply one frame's eye ratio.
    ///
    /// Emitting does not reset the counter; only an open-eye frame or face
    /// loss does, so repeats are paced by the gate alone.
    pub fn update(
        &self,
        session: &mut Session,
        gate: &EventGate,
        eye_ratio: f64,
        at: DateTime<Utc>,
    ) -> Option<ProctorEvent> {
        if eye_ratio < self.threshold {
            session.consecutive_low_eye_ratio_frames += 1;
            tracing::debug!(
                interview_id = session.id(),
                eye_ratio,
                frames = session.consecutive_low_eye_ratio_frames,
                "low eye ratio"
            );
        } else {
            session.consecutive_low_eye_ratio_frames = 0;
        }

        let frames = session.consecutive_low_eye_ratio_frames;
        if frames >= self.confirm_frames
            && gate.try_emit(session, EventKind::Drowsiness.into(), at)
        {
            tracing::info!(interview_id = session.id(), frames, "drowsiness alert");
            Some(ProctorEvent::drowsiness(session.id(), frames, at))
        } else {
            None
        }
    }
}
