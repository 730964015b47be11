//! Frame analysis orchestration.
//!
//! Runs every detector against one session for one frame, in a fixed
//! order, and returns the events that passed the gate:
//!
//! 1. multiple faces
//! 2. focus and drowsiness of the primary subject (face present)
//! 3. face presence (always)
//! 4. prohibited objects

use crate::config::DetectionConfig;
use crate::core::drowsiness::DrowsinessDetector;
use crate::core::event::ProctorEvent;
use crate::core::focus::FocusTracker;
use crate::core::gate::EventGate;
use crate::core::objects::ObjectFlagEvaluator;
use crate::core::presence::{MultiSubjectDetector, PresenceMonitor};
use crate::core::session::{lock_session, Session, SessionStats, SessionStore};
use crate::perception::signals::FrameSignals;
use crate::perception::types::{Detection, FrameReport};
use chrono::{DateTime, Utc};

/// The per-session event detection engine.
///
/// Calls for different sessions may run concurrently. Calls for the same
/// session are serialized on that session's lock, which is held only while
/// the detectors run.
pub struct ProctorEngine {
    config: DetectionConfig,
    gate: EventGate,
    multi_subject: MultiSubjectDetector,
    focus: FocusTracker,
    drowsiness: DrowsinessDetector,
    presence: PresenceMonitor,
    objects: ObjectFlagEvaluator,
    sessions: SessionStore,
}

impl ProctorEngine {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            gate: EventGate::new(config.event_cooldown()),
            multi_subject: MultiSubjectDetector,
            focus: FocusTracker::new(config.focus_timeout()),
            drowsiness: DrowsinessDetector::new(
                config.eye_ratio_threshold,
                config.eye_ratio_confirm_frames,
            ),
            presence: PresenceMonitor::new(config.face_timeout()),
            objects: ObjectFlagEvaluator::new(config.watch_list.clone()),
            sessions: SessionStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Begin a session with fresh state, its timers started at `at`.
    pub fn start_session(&self, interview_id: &str, at: DateTime<Utc>) {
        self.sessions.start(interview_id, at);
    }

    /// Begin a session with fresh state before any frame has arrived.
    ///
    /// Its timers start at the first analyzed frame, so frames stamped by
    /// a client clock are never compared against this process's clock.
    pub fn open_session(&self, interview_id: &str) {
        self.sessions.open(interview_id, Utc::now());
    }

    /// End a session. Unknown ids are ignored.
    pub fn end_session(&self, interview_id: &str) -> bool {
        self.sessions.remove(interview_id)
    }

    /// Statistics for a live session as of its latest frame.
    pub fn session_stats(&self, interview_id: &str) -> Option<SessionStats> {
        self.sessions.get(interview_id).map(|handle| {
            let session = lock_session(&handle);
            session.stats(session.clock())
        })
    }

    /// Analyze one frame's perceptual report.
    pub fn analyze_report(
        &self,
        interview_id: &str,
        report: &FrameReport,
        at: DateTime<Utc>,
    ) -> Vec<ProctorEvent> {
        let signals = FrameSignals::derive(report, &self.config);
        self.analyze(interview_id, &signals, &report.detections, at)
    }

    /// Analyze one frame from pre-derived signals.
    ///
    /// An unknown session is created on the fly, so a frame racing with
    /// the end of its stream starts a fresh session instead of failing.
    pub fn analyze(
        &self,
        interview_id: &str,
        signals: &FrameSignals,
        detections: &[Detection],
        at: DateTime<Utc>,
    ) -> Vec<ProctorEvent> {
        let handle = self.sessions.get_or_create(interview_id, at);
        let mut session = lock_session(&handle);
        session.observe_frame(at);
        self.run_detectors(&mut session, signals, detections, at)
    }

    /// Run all detectors against a session in the fixed order.
    pub fn run_detectors(
        &self,
        session: &mut Session,
        signals: &FrameSignals,
        detections: &[Detection],
        at: DateTime<Utc>,
    ) -> Vec<ProctorEvent> {
        let mut events = Vec::new();
        let face_present = signals.face_count > 0;

        if face_present {
            events.extend(self.multi_subject.check(session, &self.gate, signals.face_count, at));

            if let Some(primary) = signals.primary {
                events.extend(self.focus.update(session, &self.gate, primary.focused, at));
                events.extend(self.drowsiness.update(session, &self.gate, primary.eye_ratio, at));
            }
        }

        events.extend(self.presence.update(session, &self.gate, face_present, at));
        events.extend(self.objects.evaluate(session, &self.gate, detections, at));

        events
    }
}

impl Default for ProctorEngine {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}
