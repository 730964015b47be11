//! Derivation of the per-face focus and eye-closure signals from a
//! face-landmark mesh.
//!
//! Both derivations return `None` when the mesh lacks a required point;
//! callers substitute the documented fallback instead of failing the frame.

use crate::config::DetectionConfig;
use crate::perception::types::{Face, FrameReport};

/// Mesh index of the nose tip.
pub const NOSE_TIP: usize = 1;

/// Left eye contour: outer corner, three upper lid points, inner corner,
/// three lower lid points.
pub const LEFT_EYE: [usize; 8] = [33, 159, 158, 157, 133, 153, 145, 144];

/// Right eye contour, same ordering as [`LEFT_EYE`].
pub const RIGHT_EYE: [usize; 8] = [362, 386, 387, 388, 263, 373, 374, 380];

/// Eye ratio used when it cannot be measured. Sits above the closure
/// threshold, so an unmeasurable eye never counts as closed.
pub const FALLBACK_EYE_RATIO: f64 = 0.3;

const SCREEN_CENTER: (f64, f64) = (0.5, 0.5);

/// Signals derived from one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceSignals {
    /// Whether the subject appears to be looking at the screen
    pub focused: bool,
    /// Average eye aspect ratio of both eyes
    pub eye_ratio: f64,
}

impl FaceSignals {
    /// Derive signals from a face, applying fallbacks for missing points.
    pub fn derive(face: &Face, config: &DetectionConfig) -> Self {
        let focused = focus_signal(
            face,
            config.focus_horizontal_threshold,
            config.focus_vertical_threshold,
        )
        .unwrap_or(true);
        let eye_ratio = eye_aspect_ratio(face).unwrap_or(FALLBACK_EYE_RATIO);

        Self { focused, eye_ratio }
    }
}

/// Signals for a whole frame, ready for the engine.
#[derive(Debug, Clone, Default)]
pub struct FrameSignals {
    /// Number of faces the face detector reported
    pub face_count: usize,
    /// Signals of the primary subject, when a landmark mesh was available
    pub primary: Option<FaceSignals>,
}

impl FrameSignals {
    /// Derive frame signals from a perceptual report.
    ///
    /// The primary subject is the first face carrying a landmark mesh.
    pub fn derive(report: &FrameReport, config: &DetectionConfig) -> Self {
        let primary = report
            .faces
            .iter()
            .find(|face| face.has_landmarks())
            .map(|face| FaceSignals::derive(face, config));

        Self {
            face_count: report.face_count(),
            primary,
        }
    }
}

/// Compare the nose tip against screen center.
///
/// Returns `None` when the nose tip is not in the mesh.
pub fn focus_signal(
    face: &Face,
    horizontal_threshold: f64,
    vertical_threshold: f64,
) -> Option<bool> {
    let nose = face.landmark(NOSE_TIP)?;
    let horizontal_deviation = (nose.x - SCREEN_CENTER.0).abs();
    let vertical_deviation = (nose.y - SCREEN_CENTER.1).abs();

    let focused =
        horizontal_deviation < horizontal_threshold && vertical_deviation < vertical_threshold;

    tracing::debug!(
        horizontal_deviation,
        vertical_deviation,
        focused,
        "focus analysis"
    );

    Some(focused)
}

/// Average vertical/horizontal opening ratio of both eyes.
///
/// Returns `None` when any eye point is missing from the mesh.
pub fn eye_aspect_ratio(face: &Face) -> Option<f64> {
    let left = single_eye_ratio(face, &LEFT_EYE)?;
    let right = single_eye_ratio(face, &RIGHT_EYE)?;
    let average = (left + right) / 2.0;

    tracing::debug!(left, right, average, "eye aspect ratio");

    Some(average)
}

/// Lid gap at the middle of the lid divided by corner-to-corner width.
fn single_eye_ratio(face: &Face, contour: &[usize; 8]) -> Option<f64> {
    let outer_corner = face.landmark(contour[0])?;
    let inner_corner = face.landmark(contour[4])?;
    let upper_lid = face.landmark(contour[2])?;
    let lower_lid = face.landmark(contour[6])?;

    let horizontal = (outer_corner.x - inner_corner.x).abs();
    let vertical = (upper_lid.y - lower_lid.y).abs();

    if horizontal > 0.0 {
        Some(vertical / horizontal)
    } else {
        Some(FALLBACK_EYE_RATIO)
    }
}
