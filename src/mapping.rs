use serde_derive::{Deserialize, Serialize};

/// How the original image was resized before inference. The inverse
/// coordinate transform differs between the two.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResizeMode {
    /// Aspect-ratio preserving resize with letterbox padding.
    Proportional,
    /// Non-uniform stretch to the model input dimensions.
    Stretched,
}

/// Maps coordinates between model input space and original-image space.
///
/// Proportional inversion subtracts the letterbox padding and multiplies by
/// a single uniform gain; stretched inversion divides by per-axis gains.
/// The formulas are intentionally distinct and must not be merged.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CoordinateMapper {
    mode: ResizeMode,
    pub x_pad: f32,
    pub y_pad: f32,
    pub x_gain: f32,
    pub y_gain: f32,
}

impl CoordinateMapper {
    pub fn new(image_size: (u32, u32), model_size: (u32, u32), mode: ResizeMode) -> Self {
        let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);
        let (model_w, model_h) = (model_size.0 as f32, model_size.1 as f32);

        match mode {
            ResizeMode::Proportional => {
                let gain = (img_w / model_w).max(img_h / model_h);
                let ratio = (model_w / img_w).min(model_h / img_h);
                let x_pad = (model_w - img_w * ratio) / 2.0;
                let y_pad = (model_h - img_h * ratio) / 2.0;

                Self {
                    mode,
                    x_pad,
                    y_pad,
                    x_gain: gain,
                    y_gain: gain,
                }
            }
            ResizeMode::Stretched => {
                let x_gain = model_w / img_w;
                let y_gain = model_h / img_h;
                // Pads are zero by construction but kept for symmetry with
                // the proportional branch.
                let x_pad = (model_w - img_w * x_gain) / 2.0;
                let y_pad = (model_h - img_h * y_gain) / 2.0;

                Self {
                    mode,
                    x_pad,
                    y_pad,
                    x_gain,
                    y_gain,
                }
            }
        }
    }

    #[inline]
    pub fn mode(&self) -> ResizeMode {
        self.mode
    }

    /// Model-space point -> original-image point.
    #[inline]
    pub fn to_image(&self, x: f32, y: f32) -> (f32, f32) {
        match self.mode {
            ResizeMode::Proportional => (
                (x - self.x_pad) * self.x_gain,
                (y - self.y_pad) * self.y_gain,
            ),
            ResizeMode::Stretched => ((x - self.x_pad) / self.x_gain, (y - self.y_pad) / self.y_gain),
        }
    }

    /// Original-image point -> model-space point. Exact inverse of
    /// [`to_image`](Self::to_image) up to float rounding.
    #[inline]
    pub fn to_model(&self, x: f32, y: f32) -> (f32, f32) {
        match self.mode {
            ResizeMode::Proportional => (
                x / self.x_gain + self.x_pad,
                y / self.y_gain + self.y_pad,
            ),
            ResizeMode::Stretched => (x * self.x_gain + self.x_pad, y * self.y_gain + self.y_pad),
        }
    }
}
