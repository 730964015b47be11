//! Process-wide audit counters.
//!
//! Counts frames, alerts, sessions and deliveries across all interviews.
//! Nothing here identifies a candidate.

use crate::core::event::{EventKind, ProctorEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Audit counters for the running agent.
#[derive(Debug)]
pub struct AuditLog {
    frames_analyzed: AtomicU64,
    events_emitted: AtomicU64,
    /// Per-kind alert counts, indexed by [`kind_index`]
    events_by_kind: [AtomicU64; 5],
    sessions_started: AtomicU64,
    sessions_ended: AtomicU64,
    deliveries_succeeded: AtomicU64,
    deliveries_failed: AtomicU64,
    started_at: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

fn kind_index(kind: EventKind) -> usize {
    match kind {
        EventKind::MultipleFaces => 0,
        EventKind::FocusLost => 1,
        EventKind::Drowsiness => 2,
        EventKind::FaceMissing => 3,
        EventKind::SuspiciousObject => 4,
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            frames_analyzed: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            events_by_kind: Default::default(),
            sessions_started: AtomicU64::new(0),
            sessions_ended: AtomicU64::new(0),
            deliveries_succeeded: AtomicU64::new(0),
            deliveries_failed: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an audit log that resumes from and saves to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous audit stats: {}", e);
        }

        log
    }

    /// Record one analyzed frame and the events it produced.
    pub fn record_frame(&self, events: &[ProctorEvent]) {
        self.frames_analyzed.fetch_add(1, Ordering::Relaxed);
        self.events_emitted
            .fetch_add(events.len() as u64, Ordering::Relaxed);
        for event in events {
            self.events_by_kind[kind_index(event.event_type)].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_ended(&self) {
        self.sessions_ended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deliveries(&self, succeeded: u64, failed: u64) {
        self.deliveries_succeeded
            .fetch_add(succeeded, Ordering::Relaxed);
        self.deliveries_failed.fetch_add(failed, Ordering::Relaxed);
    }

    /// Alerts emitted so far for one kind.
    pub fn events_of_kind(&self, kind: EventKind) -> u64 {
        self.events_by_kind[kind_index(kind)].load(Ordering::Relaxed)
    }

    /// Get the current statistics.
    pub fn stats(&self) -> AuditStats {
        AuditStats {
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            multiple_faces: self.events_of_kind(EventKind::MultipleFaces),
            focus_lost: self.events_of_kind(EventKind::FocusLost),
            drowsiness: self.events_of_kind(EventKind::Drowsiness),
            face_missing: self.events_of_kind(EventKind::FaceMissing),
            suspicious_object: self.events_of_kind(EventKind::SuspiciousObject),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_ended: self.sessions_ended.load(Ordering::Relaxed),
            deliveries_succeeded: self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Agent Statistics:\n\
             - Frames analyzed: {}\n\
             - Alerts emitted: {}\n\
             \x20   multiple faces: {}, focus lost: {}, drowsiness: {}\n\
             \x20   face missing: {}, suspicious object: {}\n\
             - Sessions started/ended: {}/{}\n\
             - Deliveries ok/failed: {}/{}\n\
             - Uptime: {} seconds",
            stats.frames_analyzed,
            stats.events_emitted,
            stats.multiple_faces,
            stats.focus_lost,
            stats.drowsiness,
            stats.face_missing,
            stats.suspicious_object,
            stats.sessions_started,
            stats.sessions_ended,
            stats.deliveries_succeeded,
            stats.deliveries_failed,
            stats.uptime_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                frames_analyzed: stats.frames_analyzed,
                events_emitted: stats.events_emitted,
                events_by_kind: [
                    stats.multiple_faces,
                    stats.focus_lost,
                    stats.drowsiness,
                    stats.face_missing,
                    stats.suspicious_object,
                ],
                sessions_started: stats.sessions_started,
                sessions_ended: stats.sessions_ended,
                deliveries_succeeded: stats.deliveries_succeeded,
                deliveries_failed: stats.deliveries_failed,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_analyzed
                    .store(persisted.frames_analyzed, Ordering::Relaxed);
                self.events_emitted
                    .store(persisted.events_emitted, Ordering::Relaxed);
                for (counter, value) in self.events_by_kind.iter().zip(persisted.events_by_kind) {
                    counter.store(value, Ordering::Relaxed);
                }
                self.sessions_started
                    .store(persisted.sessions_started, Ordering::Relaxed);
                self.sessions_ended
                    .store(persisted.sessions_ended, Ordering::Relaxed);
                self.deliveries_succeeded
                    .store(persisted.deliveries_succeeded, Ordering::Relaxed);
                self.deliveries_failed
                    .store(persisted.deliveries_failed, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of audit statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub frames_analyzed: u64,
    pub events_emitted: u64,
    pub multiple_faces: u64,
    pub focus_lost: u64,
    pub drowsiness: u64,
    pub face_missing: u64,
    pub suspicious_object: u64,
    pub sessions_started: u64,
    pub sessions_ended: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub frames_analyzed: u64,
    pub events_emitted: u64,
    pub events_by_kind: [u64; 5],
    pub sessions_started: u64,
    pub sessions_ended: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub last_updated: DateTime<Utc>,
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

/// Create a new shared audit log.
pub fn create_shared_log() -> SharedAuditLog {
    Arc::new(AuditLog::new())
}

/// Create a new shared audit log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedAuditLog {
    Arc::new(AuditLog::with_persistence(path))
}
