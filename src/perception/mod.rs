//! Perceptual inputs consumed by the engine.
//!
//! Face-landmark and object detection run outside this crate; this module
//! only types their per-frame outputs and derives the scalar signals the
//! detectors work on.

pub mod signals;
pub mod types;

// Re-export commonly used types
pub use signals::{eye_aspect_ratio, focus_signal, FaceSignals, FrameSignals, FALLBACK_EYE_RATIO};
pub use types::{BoundingBox, Detection, DetectionSet, Face, FaceSet, FrameReport, Landmark};
