//! Core functionality for the proctoring agent.
//!
//! This module contains:
//! - Session state and the concurrent session store
//! - The cooldown gate shared by all detectors
//! - The detectors (focus, drowsiness, presence, objects)
//! - The orchestrator that runs them per frame

pub mod drowsiness;
pub mod engine;
pub mod event;
pub mod focus;
pub mod gate;
pub mod objects;
pub mod presence;
pub mod session;

// Re-export commonly used types
pub use drowsiness::DrowsinessDetector;
pub use engine::ProctorEngine;
pub use event::{EventKey, EventKind, EventMetadata, ProctorEvent, Severity};
pub use focus::FocusTracker;
pub use gate::EventGate;
pub use objects::ObjectFlagEvaluator;
pub use presence::{MultiSubjectDetector, PresenceMonitor};
pub use session::{Session, SessionStats, SessionStore, SharedSession};
