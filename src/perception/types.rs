//! Per-frame outputs of the perceptual collaborators.
//!
//! These types carry ONLY what the face-landmark and object detectors
//! report for a single frame - never pixels.

use serde::{Deserialize, Serialize};

/// A normalized 2-D landmark point, coordinates in `[0, 1]` relative to
/// frame width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in pixel coordinates: `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Corners rounded down to whole pixels.
    pub fn to_pixels(&self) -> [i64; 4] {
        [
            self.x1.floor() as i64,
            self.y1.floor() as i64,
            self.x2.floor() as i64,
            self.y2.floor() as i64,
        ]
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(corners: [f64; 4]) -> Self {
        Self::new(corners[0], corners[1], corners[2], corners[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x1, bbox.y1, bbox.x2, bbox.y2]
    }
}

/// A detected face.
///
/// `landmarks` is empty when the face detector found a face but the
/// landmark model produced no mesh for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Face {
    #[serde(default, alias = "boundingBox", skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

impl Face {
    pub fn with_landmarks(landmarks: Vec<Landmark>) -> Self {
        Self {
            bounding_box: None,
            landmarks,
        }
    }

    /// Landmark at a mesh index, if the mesh is that large.
    pub fn landmark(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn has_landmarks(&self) -> bool {
        !self.landmarks.is_empty()
    }
}

/// Ordered faces detected in one frame.
pub type FaceSet = Vec<Face>;

/// A labeled object detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Detector confidence in `[0, 1]`
    pub confidence: f64,
    #[serde(default, alias = "boundingBox", alias = "bbox")]
    pub bounding_box: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64, bounding_box: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bounding_box,
        }
    }
}

/// Ordered object detections for one frame.
pub type DetectionSet = Vec<Detection>;

/// Everything the perceptual collaborators reported for one frame.
///
/// A collaborator that failed or returned nothing usable is represented by
/// an empty list, so a broken model degrades to "no detection this frame".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    #[serde(default)]
    pub faces: FaceSet,
    #[serde(default)]
    pub detections: DetectionSet,
}

impl FrameReport {
    pub fn new(faces: FaceSet, detections: DetectionSet) -> Self {
        Self { faces, detections }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}
