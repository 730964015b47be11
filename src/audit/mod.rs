//! Audit module for the proctoring agent.
//!
//! Tracks what the agent has processed and flagged, without retaining any
//! frame content.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, AuditLog, AuditStats, SharedAuditLog,
};
