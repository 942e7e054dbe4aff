use log::debug;
use ndarray::ArrayView3;
use num_traits::Float;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{Rect, RectF};
use crate::error::Error;

/// Bit-packed binary mask covering a detection's bounding box.
///
/// Pixel `(x, y)` lives at linear index `i = y * width + x`; its bit sits in
/// byte `i >> 3` at position `i & 7`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BitMask {
    width: usize,
    height: usize,
    bits: Vec<u8>,
}

impl BitMask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![0u8; (width * height + 7) / 8],
        }
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total pixel count.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        let i = y * self.width + x;
        self.bits[i >> 3] & (1 << (i & 7)) != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize) {
        let i = y * self.width + x;
        self.bits[i >> 3] |= 1 << (i & 7);
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Ordered boundary of the largest-first connected region, traced with
    /// Moore neighborhood following. Returns at most `max_points` points,
    /// evenly thinned when the raw boundary is longer.
    pub fn trace_contour(&self, max_points: usize) -> Vec<(usize, usize)> {
        // Clockwise Moore neighborhood, starting west.
        const DIRS: [(i32, i32); 8] = [
            (-1, 0),
            (-1, -1),
            (0, -1),
            (1, -1),
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
        ];

        let start = match self.first_set_pixel() {
            Some(p) => p,
            None => return Vec::new(),
        };

        let mut contour = vec![start];
        let mut current = start;
        // First set pixel was reached scanning left to right, so its west
        // neighbor is background.
        let mut search_from = 0usize;
        let limit = 4 * (self.width + self.height) + 8;

        loop {
            let mut advanced = false;
            for i in 0..8 {
                let d = (search_from + i) % 8;
                let nx = current.0 as i32 + DIRS[d].0;
                let ny = current.1 as i32 + DIRS[d].1;
                if nx < 0 || ny < 0 || nx as usize >= self.width || ny as usize >= self.height {
                    continue;
                }
                if !self.get(nx as usize, ny as usize) {
                    continue;
                }

                let next = (nx as usize, ny as usize);
                if next == start && contour.len() > 2 {
                    return thin_contour(contour, max_points);
                }
                contour.push(next);
                current = next;
                search_from = (d + 5) % 8;
                advanced = true;
                break;
            }

            // Isolated pixel, or a degenerate boundary that ran too long.
            if !advanced || contour.len() > limit {
                return thin_contour(contour, max_points);
            }
        }
    }

    fn first_set_pixel(&self) -> Option<(usize, usize)> {
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    return Some((x, y));
                }
            }
        }
        None
    }
}

fn thin_contour(contour: Vec<(usize, usize)>, max_points: usize) -> Vec<(usize, usize)> {
    if contour.len() <= max_points || max_points == 0 {
        return contour;
    }

    let step = contour.len() as f32 / max_points as f32;
    (0..max_points)
        .map(|i| contour[(i as f32 * step) as usize])
        .collect()
}

#[inline(always)]
fn sigmoid<F: Float>(v: F) -> F {
    F::one() / (F::one() + (-v).exp())
}

/// Rebuilds per-detection binary masks from a segmentation prototype tensor
/// and per-detection mask weights.
#[derive(Debug, Copy, Clone)]
pub struct MaskReconstructor {
    model_size: (u32, u32),
    mask_size: (u32, u32),
    channels: usize,
}

impl MaskReconstructor {
    pub fn new(model_size: (u32, u32), mask_size: (u32, u32), channels: usize) -> Result<Self, Error> {
        if model_size.0 == 0 || model_size.1 == 0 || mask_size.0 == 0 || mask_size.1 == 0 {
            return Err(Error::InvalidShape(format!(
                "mask reconstructor sizes must be positive, got model {model_size:?} mask {mask_size:?}"
            )));
        }
        if channels == 0 {
            return Err(Error::InvalidShape("mask channel count must be positive".into()));
        }

        Ok(Self {
            model_size,
            mask_size,
            channels,
        })
    }

    /// `proto` is the `[channels, mask_h, mask_w]` prototype tensor.
    /// `model_rect` is the detection's box in model input space and
    /// `image_rect` the final box in image space; the produced mask covers
    /// `image_rect` pixel for pixel. A pixel is set when its sigmoid
    /// activation is strictly above `threshold`.
    pub fn reconstruct(
        &self,
        proto: ArrayView3<'_, f32>,
        weights: &[f32],
        model_rect: RectF,
        image_rect: Rect,
        threshold: f32,
    ) -> Result<BitMask, Error> {
        let (mask_w, mask_h) = (self.mask_size.0 as usize, self.mask_size.1 as usize);

        if proto.dim() != (self.channels, mask_h, mask_w) {
            return Err(Error::InvalidShape(format!(
                "prototype tensor has shape {:?}, expected {:?}",
                proto.dim(),
                (self.channels, mask_h, mask_w)
            )));
        }
        if weights.len() != self.channels {
            return Err(Error::InvalidShape(format!(
                "got {} mask weights, expected {}",
                weights.len(),
                self.channels
            )));
        }

        let dst_w = image_rect.width().max(1) as usize;
        let dst_h = image_rect.height().max(1) as usize;
        let mut mask = BitMask::new(dst_w, dst_h);

        // Downscale the model-space box into prototype resolution. Floor on
        // the near edges and ceil on the far edges keeps every covered
        // prototype cell.
        let x_scale = self.mask_size.0 as f32 / self.model_size.0 as f32;
        let y_scale = self.mask_size.1 as f32 / self.model_size.1 as f32;

        let left = ((model_rect.left * x_scale).floor() as i64).clamp(0, mask_w as i64) as usize;
        let top = ((model_rect.top * y_scale).floor() as i64).clamp(0, mask_h as i64) as usize;
        let right = ((model_rect.right * x_scale).ceil() as i64).clamp(0, mask_w as i64) as usize;
        let bottom = ((model_rect.bottom * y_scale).ceil() as i64).clamp(0, mask_h as i64) as usize;

        let crop_w = right.saturating_sub(left);
        let crop_h = bottom.saturating_sub(top);
        if crop_w == 0 || crop_h == 0 {
            debug!("mask crop for {model_rect:?} is empty at prototype resolution");
            return Ok(mask);
        }

        // Weighted channel sum plus sigmoid over the cropped region only.
        let mut crop = vec![0f32; crop_w * crop_h];
        for y in 0..crop_h {
            for x in 0..crop_w {
                let mut acc = 0f32;
                for (c, w) in weights.iter().enumerate() {
                    acc += w * proto[(c, top + y, left + x)];
                }
                crop[y * crop_w + x] = sigmoid(acc);
            }
        }

        // Bilinear upscale of the crop onto the image-space box, then
        // strict-greater thresholding into the packed mask.
        let sx = crop_w as f32 / dst_w as f32;
        let sy = crop_h as f32 / dst_h as f32;

        for y in 0..dst_h {
            let fy = y as f32 * sy;
            let y0 = fy as usize;
            let y1 = (y0 + 1).min(crop_h - 1);
            let wy = fy - y0 as f32;

            for x in 0..dst_w {
                let fx = x as f32 * sx;
                let x0 = fx as usize;
                let x1 = (x0 + 1).min(crop_w - 1);
                let wx = fx - x0 as f32;

                let top_row = crop[y0 * crop_w + x0] * (1.0 - wx) + crop[y0 * crop_w + x1] * wx;
                let bottom_row = crop[y1 * crop_w + x0] * (1.0 - wx) + crop[y1 * crop_w + x1] * wx;
                let value = top_row * (1.0 - wy) + bottom_row * wy;

                if value > threshold {
                    mask.set(x, y);
                }
            }
        }

        Ok(mask)
    }
}
