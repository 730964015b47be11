//! Integrity event records.
//!
//! An event is an immutable value: kind, human readable message, severity,
//! kind-specific metadata, timestamp and the interview it belongs to.
//! Deduplication happens in the [`EventGate`](crate::core::gate::EventGate),
//! never through event identity.

use crate::perception::types::BoundingBox;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The closed set of event kinds reported downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MultipleFaces,
    FocusLost,
    Drowsiness,
    FaceMissing,
    SuspiciousObject,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MultipleFaces => "multiple_faces",
            EventKind::FocusLost => "focus_lost",
            EventKind::Drowsiness => "drowsiness",
            EventKind::FaceMissing => "face_missing",
            EventKind::SuspiciousObject => "suspicious_object",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooldown key.
///
/// Object alerts are keyed per label so that different objects do not
/// suppress each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Kind(EventKind),
    Object(String),
}

impl EventKey {
    pub fn object(label: impl Into<String>) -> Self {
        EventKey::Object(label.into())
    }
}

impl From<EventKind> for EventKey {
    fn from(kind: EventKind) -> Self {
        EventKey::Kind(kind)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Kind(kind) => write!(f, "{kind}"),
            EventKey::Object(label) => write!(f, "suspicious_object:{label}"),
        }
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Kind-specific event details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventMetadata {
    #[serde(rename_all = "camelCase")]
    MultipleFaces { face_count: usize },
    /// Seconds the condition has lasted (focus lost or face missing)
    Duration { duration: f64 },
    #[serde(rename_all = "camelCase")]
    Drowsiness {
        detection_type: &'static str,
        consecutive_frames: u32,
    },
    #[serde(rename_all = "camelCase")]
    SuspiciousObject {
        label: String,
        confidence: f64,
        bounding_box: [i64; 4],
        display_name: String,
    },
}

/// A timestamped integrity alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctorEvent {
    pub event_type: EventKind,
    pub message: String,
    pub severity: Severity,
    pub metadata: EventMetadata,
    #[serde(with = "unix_seconds")]
    pub timestamp: DateTime<Utc>,
    pub interview_id: String,
}

impl ProctorEvent {
    pub fn multiple_faces(interview_id: &str, face_count: usize, at: DateTime<Utc>) -> Self {
        Self {
            event_type: EventKind::MultipleFaces,
            message: format!("Multiple faces detected ({face_count})"),
            severity: Severity::High,
            metadata: EventMetadata::MultipleFaces { face_count },
            timestamp: at,
            interview_id: interview_id.to_string(),
        }
    }

    pub fn focus_lost(interview_id: &str, duration: f64, at: DateTime<Utc>) -> Self {
        Self {
            event_type: EventKind::FocusLost,
            message: format!("Not looking at screen for {duration:.1}s"),
            severity: Severity::Medium,
            metadata: EventMetadata::Duration { duration },
            timestamp: at,
            interview_id: interview_id.to_string(),
        }
    }

    pub fn drowsiness(interview_id: &str, consecutive_frames: u32, at: DateTime<Utc>) -> Self {
        Self {
            event_type: EventKind::Drowsiness,
            message: "Candidate appears drowsy (eyes closed)".to_string(),
            severity: Severity::Medium,
            metadata: EventMetadata::Drowsiness {
                detection_type: "eye_closure",
                consecutive_frames,
            },
            timestamp: at,
            interview_id: interview_id.to_string(),
        }
    }

    pub fn face_missing(interview_id: &str, duration: f64, at: DateTime<Utc>) -> Self {
        Self {
            event_type: EventKind::FaceMissing,
            message: format!("No face detected for {duration:.1}s"),
            severity: Severity::High,
            metadata: EventMetadata::Duration { duration },
            timestamp: at,
            interview_id: interview_id.to_string(),
        }
    }

    pub fn suspicious_object(
        interview_id: &str,
        label: &str,
        confidence: f64,
        bounding_box: &BoundingBox,
        display_name: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: EventKind::SuspiciousObject,
            message: format!("{display_name} detected"),
            severity: Severity::High,
            metadata: EventMetadata::SuspiciousObject {
                label: label.to_string(),
                confidence,
                bounding_box: bounding_box.to_pixels(),
                display_name,
            },
            timestamp: at,
            interview_id: interview_id.to_string(),
        }
    }
}

/// Seconds between two instants as a float.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// Serde support for timestamps as fractional Unix seconds.
pub mod unix_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Serialize, Serializer};

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        to_f64(timestamp).serialize(serializer)
    }

    pub fn to_f64(timestamp: &DateTime<Utc>) -> f64 {
        timestamp.timestamp_millis() as f64 / 1000.0
    }
}
