//! Prohibited object flagging.

use crate::config::WatchList;
use crate::core::event::{EventKey, ProctorEvent};
use crate::core::gate::EventGate;
use crate::core::session::Session;
use crate::perception::types::Detection;
use chrono::{DateTime, Utc};

/// Raises `suspicious_object` for watched labels that clear their
/// label-specific confidence bar.
#[derive(Debug, Clone)]
pub struct ObjectFlagEvaluator {
    watch_list: WatchList,
}

impl ObjectFlagEvaluator {
    pub fn new(watch_list: WatchList) -> Self {
        Self { watch_list }
    }

    /// Whether a detection is a watched label above its bar.
    pub fn is_flagged(&self, detection: &Detection) -> bool {
        self.watch_list
            .get(&detection.label)
            .map(|entry| detection.confidence > entry.min_confidence)
            .unwrap_or(false)
    }

    /// Evaluate a frame's detections in order.
    pub fn evaluate(
        &self,
        session: &mut Session,
        gate: &EventGate,
        detections: &[Detection],
        at: DateTime<Utc>,
    ) -> Vec<ProctorEvent> {
        let mut events = Vec::new();

        for detection in detections.iter().filter(|d| self.is_flagged(d)) {
            let key = EventKey::object(detection.label.as_str());
            if !gate.try_emit(session, key, at) {
                continue;
            }

            let display_name = self.watch_list.display_name(&detection.label);
            tracing::info!(
                interview_id = session.id(),
                label = %detection.label,
                confidence = detection.confidence,
                "suspicious object alert"
            );
            events.push(ProctorEvent::suspicious_object(
                session.id(),
                &detection.label,
                detection.confidence,
                &detection.bounding_box,
                display_name,
                at,
            ));
        }

        events
    }
}
