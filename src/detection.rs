use serde_derive::{Deserialize, Serialize};

use crate::bbox::{Rect, RectF};
use crate::mask::BitMask;

/// One entry of the model's label table. Shared for the model's lifetime
/// and looked up by index during decoding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub index: usize,
    pub name: String,
    pub color: String,
}

impl Label {
    pub fn new(index: usize, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            color: color.into(),
        }
    }
}

/// A pose keypoint in image space.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct KeyPoint {
    pub x: i32,
    pub y: i32,
    pub confidence: f64,
}

/// Track identity attached to a detection when tracking is active.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TrackingInfo {
    pub id: u64,
    /// Recent centroid history, oldest first.
    pub tail: Vec<(f32, f32)>,
}

/// Working record produced by the decoder for a single prediction that
/// passed the confidence threshold. Frame-scoped: owned by one decode call
/// and released back to the pool afterwards.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub label_index: usize,
    pub confidence: f64,
    /// Box mapped back to original-image space.
    pub rect: Rect,
    /// Box in model input space, needed by the mask reconstructor.
    pub model_rect: RectF,
    /// Prediction slot this candidate was decoded from.
    pub source_index: usize,
    /// Rotation in radians for oriented boxes, 0 otherwise.
    pub angle: f32,
    pub keypoints: Vec<KeyPoint>,
    /// Per-channel mask weights for segmentation models, empty otherwise.
    pub mask_weights: Vec<f32>,
}

impl Candidate {
    pub fn clear(&mut self) {
        self.label_index = 0;
        self.confidence = 0.0;
        self.rect = Rect::default();
        self.model_rect = RectF::default();
        self.source_index = 0;
        self.angle = 0.0;
        self.keypoints.clear();
        self.mask_weights.clear();
    }
}

/// Final per-object result handed to callers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: Label,
    pub confidence: f64,
    pub rect: Rect,
    /// Rotation in radians for oriented-box models, 0 otherwise.
    pub angle: f32,
    pub keypoints: Vec<KeyPoint>,
    pub mask: Option<BitMask>,
    pub tracking: Option<TrackingInfo>,
}

impl Detection {
    /// Build a detection from a decoded candidate, resolving its label.
    pub fn from_candidate(candidate: &Candidate, labels: &[Label]) -> Self {
        Self {
            label: labels[candidate.label_index].clone(),
            confidence: candidate.confidence,
            rect: candidate.rect,
            angle: candidate.angle,
            keypoints: candidate.keypoints.clone(),
            mask: None,
            tracking: None,
        }
    }

    #[inline]
    pub fn centroid(&self) -> (f32, f32) {
        self.rect.centroid()
    }
}
