use serde_derive::{Deserialize, Serialize};

/// Axis-aligned box in original-image pixel space, left-top-right-bottom.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    #[inline]
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[inline(always)]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline(always)]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    #[inline(always)]
    pub fn area(&self) -> f32 {
        self.width() as f32 * self.height() as f32
    }

    /// Center of the box, in pixels.
    #[inline]
    pub fn centroid(&self) -> (f32, f32) {
        (
            self.left as f32 + self.width() as f32 / 2.0,
            self.top as f32 + self.height() as f32 / 2.0,
        )
    }

    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// Intersection-over-union. Zero for disjoint boxes, no further
    /// arithmetic is performed in that case.
    pub fn iou(&self, other: &Rect) -> f32 {
        if !self.intersects(other) {
            return 0.0;
        }

        let l = self.left.max(other.left);
        let t = self.top.max(other.top);
        let r = self.right.min(other.right);
        let b = self.bottom.min(other.bottom);

        let intersection = ((r - l) as f32) * ((b - t) as f32);
        if intersection <= 0.0 {
            return 0.0;
        }

        intersection / (self.area() + other.area() - intersection)
    }

    /// Clamp all edges into `[0, w) x [0, h)`.
    pub fn clamp(&self, width: i32, height: i32) -> Rect {
        Rect {
            left: self.left.clamp(0, width - 1),
            top: self.top.clamp(0, height - 1),
            right: self.right.clamp(0, width - 1),
            bottom: self.bottom.clamp(0, height - 1),
        }
    }
}

/// Axis-aligned box in model input space, kept at float precision for the
/// segmentation mask path.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Default)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RectF {
    #[inline]
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[inline]
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            left: cx - w / 2.0,
            top: cy - h / 2.0,
            right: cx + w / 2.0,
            bottom: cy + h / 2.0,
        }
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}
