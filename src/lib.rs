//! Proctor Agent - integrity event engine for proctored video interviews.
//!
//! This library turns noisy per-frame perceptual signals (face landmarks,
//! object detections) into a small number of rate-limited, timestamped
//! integrity events per interview session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Proctor Agent                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐           │
//! │  │ Perception  │──▶│   Detectors  │──▶│  Event Gate  │──▶ events │
//! │  │  (signals)  │   │ (per session)│   │  (cooldown)  │           │
//! │  └─────────────┘   └──────────────┘   └──────────────┘           │
//! │                           │                    │                 │
//! │                           ▼                    ▼                 │
//! │                    ┌──────────────┐    ┌──────────────┐          │
//! │                    │ Session Store│    │   Recorder   │          │
//! │                    └──────────────┘    └──────────────┘          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use proctor_agent::core::{EventKind, ProctorEngine};
//! use proctor_agent::perception::{Face, FrameReport};
//!
//! let engine = ProctorEngine::default();
//! let t0 = Utc::now();
//! engine.start_session("interview-1", t0);
//!
//! let two_people = FrameReport::new(vec![Face::default(), Face::default()], vec![]);
//! let events = engine.analyze_report("interview-1", &two_people, t0 + Duration::seconds(1));
//!
//! assert_eq!(events[0].event_type, EventKind::MultipleFaces);
//! ```

pub mod audit;
pub mod config;
pub mod core;
pub mod perception;

#[cfg(feature = "recorder")]
pub mod recorder;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use audit::{AuditLog, AuditStats, SharedAuditLog};
pub use config::{Config, ConfigError, DetectionConfig, WatchList};
pub use self::core::{EventKind, ProctorEngine, ProctorEvent, SessionStats, SessionStore, Severity};
pub use perception::{Detection, Face, FrameReport, FrameSignals};

#[cfg(feature = "recorder")]
pub use recorder::{DeliveryReport, RecorderClient, RecorderConfig, RecorderError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice describing what the agent monitors, for display to candidates.
pub const MONITORING_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              PROCTOR AGENT - MONITORING NOTICE                   ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  During this interview your camera feed is analysed for:         ║
║    • Your face leaving the frame for more than 10 seconds        ║
║    • Looking away from the screen for more than 7 seconds        ║
║    • Signs of drowsiness (eyes closed across several frames)     ║
║    • More than one person in view                                ║
║    • Phones, books, notes or other devices in view               ║
║                                                                  ║
║  Only the resulting alerts are recorded. Frames are not stored   ║
║  by this agent.                                                  ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
