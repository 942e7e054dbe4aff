use log::warn;

use crate::bbox::{Rect, RectF};
use crate::detection::{Candidate, Detection, KeyPoint, Label};
use crate::error::Error;
use crate::layout::{OutputLayout, ScoreEncoding};
use crate::mapping::{CoordinateMapper, ResizeMode};
use crate::pool::{CandidateBuffer, CandidatePool};

/// Turns a raw model output tensor into confidence-filtered candidates with
/// boxes mapped back to original-image space.
#[derive(Debug, Clone)]
pub struct TensorDecoder {
    layout: OutputLayout,
    labels: Vec<Label>,
    model_size: (u32, u32),
    resize_mode: ResizeMode,
    confidence_threshold: f64,
}

impl TensorDecoder {
    pub fn new(
        layout: OutputLayout,
        labels: Vec<Label>,
        model_size: (u32, u32),
        resize_mode: ResizeMode,
        confidence_threshold: f64,
    ) -> Result<Self, Error> {
        if model_size.0 == 0 || model_size.1 == 0 {
            return Err(Error::InvalidShape(format!(
                "model input size must be positive, got {model_size:?}"
            )));
        }

        let declared = match layout {
            OutputLayout::ChannelMajor { labels, .. } => Some(labels),
            OutputLayout::PredictionMajor {
                scores: ScoreEncoding::PerLabel(n),
                ..
            } => Some(n),
            OutputLayout::PredictionMajor {
                scores: ScoreEncoding::ConfidenceAndClass,
                ..
            } => None,
        };
        if let Some(n) = declared {
            if n != labels.len() {
                return Err(Error::InvalidShape(format!(
                    "layout declares {n} labels but the label table has {}",
                    labels.len()
                )));
            }
        }

        Ok(Self {
            layout,
            labels,
            model_size,
            resize_mode,
            confidence_threshold,
        })
    }

    #[inline]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Decode one frame's output into a rented candidate buffer. The buffer
    /// returns to `pool` when dropped.
    pub fn decode<'p>(
        &self,
        output: &[f32],
        image_size: (u32, u32),
        pool: &'p CandidatePool,
    ) -> Result<CandidateBuffer<'p>, Error> {
        if image_size.0 == 0 || image_size.1 == 0 {
            return Err(Error::InvalidShape(format!(
                "image size must be positive, got {image_size:?}"
            )));
        }
        if output.len() != self.layout.expected_len() {
            return Err(Error::InvalidShape(format!(
                "output buffer has {} elements, layout expects {}",
                output.len(),
                self.layout.expected_len()
            )));
        }

        let mapper = CoordinateMapper::new(image_size, self.model_size, self.resize_mode);
        let mut candidates = pool.rent();

        match self.layout {
            OutputLayout::ChannelMajor {
                channels,
                labels,
                angle,
                keypoints,
                mask_weights,
            } => {
                for i in 0..channels {
                    let mut best = f32::MIN;
                    let mut best_label = 0usize;
                    let mut off = i + 4 * channels;
                    for l in 0..labels {
                        let score = output[off];
                        if score > best {
                            best = score;
                            best_label = l;
                        }
                        off += channels;
                    }
                    if (best as f64) < self.confidence_threshold {
                        continue;
                    }

                    let model_rect = RectF::from_cxcywh(
                        output[i],
                        output[i + channels],
                        output[i + 2 * channels],
                        output[i + 3 * channels],
                    );
                    let mut candidate = self.candidate(
                        i,
                        best_label,
                        best as f64,
                        model_rect,
                        &mapper,
                        image_size,
                    );

                    let extra = i + channels * (4 + labels);
                    if angle {
                        candidate.angle = output[extra];
                    }
                    for k in 0..keypoints {
                        let kx = output[extra + channels * (3 * k)];
                        let ky = output[extra + channels * (3 * k + 1)];
                        let kc = output[extra + channels * (3 * k + 2)];
                        let (ix, iy) = mapper.to_image(kx, ky);
                        candidate.keypoints.push(KeyPoint {
                            x: ix.round() as i32,
                            y: iy.round() as i32,
                            confidence: kc as f64,
                        });
                    }
                    for m in 0..mask_weights {
                        candidate.mask_weights.push(output[extra + channels * m]);
                    }

                    candidates.push(candidate);
                }
            }
            OutputLayout::PredictionMajor {
                predictions,
                attributes,
                scores,
                mask_weights,
            } => {
                for i in 0..predictions {
                    let p = &output[i * attributes..(i + 1) * attributes];

                    let (conf, label_index) = match scores {
                        ScoreEncoding::PerLabel(n) => {
                            let mut best = f32::MIN;
                            let mut best_label = 0usize;
                            for (l, score) in p[4..4 + n].iter().enumerate() {
                                if *score > best {
                                    best = *score;
                                    best_label = l;
                                }
                            }
                            (best, best_label)
                        }
                        ScoreEncoding::ConfidenceAndClass => (p[4], p[5] as usize),
                    };
                    if (conf as f64) < self.confidence_threshold {
                        continue;
                    }
                    if label_index >= self.labels.len() {
                        warn!("prediction {i} encodes label {label_index} outside the label table, skipping");
                        continue;
                    }

                    // Per-label prediction-major heads emit boxes normalized
                    // to [0, 1]; scale them to model input space first.
                    let (mut cx, mut cy, mut w, mut h) = (p[0], p[1], p[2], p[3]);
                    if matches!(scores, ScoreEncoding::PerLabel(_)) {
                        cx *= self.model_size.0 as f32;
                        w *= self.model_size.0 as f32;
                        cy *= self.model_size.1 as f32;
                        h *= self.model_size.1 as f32;
                    }

                    let model_rect = RectF::from_cxcywh(cx, cy, w, h);
                    let mut candidate =
                        self.candidate(i, label_index, conf as f64, model_rect, &mapper, image_size);

                    candidate
                        .mask_weights
                        .extend_from_slice(&p[attributes - mask_weights..]);

                    candidates.push(candidate);
                }
            }
        }

        Ok(candidates)
    }

    fn candidate(
        &self,
        source_index: usize,
        label_index: usize,
        confidence: f64,
        model_rect: RectF,
        mapper: &CoordinateMapper,
        image_size: (u32, u32),
    ) -> Candidate {
        let (left, top) = mapper.to_image(model_rect.left, model_rect.top);
        let (right, bottom) = mapper.to_image(model_rect.right, model_rect.bottom);

        let rect = Rect::new(
            left.round() as i32,
            top.round() as i32,
            right.round() as i32,
            bottom.round() as i32,
        )
        .clamp(image_size.0 as i32, image_size.1 as i32);

        Candidate {
            label_index,
            confidence,
            rect,
            model_rect,
            source_index,
            angle: 0.0,
            keypoints: Vec::new(),
            mask_weights: Vec::new(),
        }
    }

    /// Resolve surviving candidates into final detections.
    pub fn detections(&self, candidates: &[Candidate]) -> Vec<Detection> {
        candidates
            .iter()
            .map(|c| Detection::from_candidate(c, &self.labels))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<Label> {
        (0..n)
            .map(|i| Label::new(i, format!("label{i}"), "#ffffff"))
            .collect()
    }

    #[test]
    fn channel_major_picks_per_label_maximum() {
        // 2 predictions, 2 labels; attribute k of prediction i at i + 2k.
        let layout = OutputLayout::channel_major_detect(2, 2).unwrap();
        let decoder =
            TensorDecoder::new(layout, labels(2), (64, 64), ResizeMode::Stretched, 0.25).unwrap();
        let pool = CandidatePool::new(2);

        let output = [
            10.0, 40.0, // cx
            10.0, 40.0, // cy
            4.0, 8.0, // w
            4.0, 8.0, // h
            0.2, 0.1, // label 0 scores
            0.9, 0.05, // label 1 scores
        ];

        let candidates = decoder.decode(&output, (64, 64), &pool).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].label_index, 1);
        assert!((candidates[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(candidates[0].rect, Rect::new(8, 8, 12, 12));
        assert_eq!(candidates[0].source_index, 0);
    }

    #[test]
    fn layouts_agree_on_the_same_logical_prediction() {
        let cm = TensorDecoder::new(
            OutputLayout::channel_major_detect(2, 2).unwrap(),
            labels(2),
            (64, 64),
            ResizeMode::Stretched,
            0.25,
        )
        .unwrap();
        let pm = TensorDecoder::new(
            OutputLayout::prediction_major_top1(2, 6).unwrap(),
            labels(2),
            (64, 64),
            ResizeMode::Stretched,
            0.25,
        )
        .unwrap();
        let pool = CandidatePool::new(2);

        let cm_out = [
            10.0, 40.0, 10.0, 40.0, 4.0, 8.0, 4.0, 8.0, 0.2, 0.1, 0.9, 0.05,
        ];
        let pm_out = [
            10.0, 10.0, 4.0, 4.0, 0.9, 1.0, // prediction 0
            40.0, 40.0, 8.0, 8.0, 0.05, 0.0, // prediction 1, filtered
        ];

        let a = cm.decode(&cm_out, (64, 64), &pool).unwrap();
        let b = pm.decode(&pm_out, (64, 64), &pool).unwrap();

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(a[0].rect, b[0].rect);
        assert_eq!(a[0].label_index, b[0].label_index);
        assert!((a[0].confidence - b[0].confidence).abs() < 1e-6);
    }

    #[test]
    fn per_label_prediction_major_scales_normalized_boxes() {
        let decoder = TensorDecoder::new(
            OutputLayout::prediction_major_detect(1, 6, 2).unwrap(),
            labels(2),
            (100, 100),
            ResizeMode::Stretched,
            0.25,
        )
        .unwrap();
        let pool = CandidatePool::new(1);

        let output = [0.5, 0.5, 0.2, 0.2, 0.3, 0.8];
        let candidates = decoder.decode(&output, (100, 100), &pool).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].label_index, 1);
        assert_eq!(candidates[0].rect, Rect::new(40, 40, 60, 60));
    }

    #[test]
    fn pose_keypoints_are_mapped_into_image_space() {
        let layout = OutputLayout::channel_major_pose(1, 1, 8).unwrap();
        let decoder =
            TensorDecoder::new(layout, labels(1), (64, 64), ResizeMode::Stretched, 0.25).unwrap();
        let pool = CandidatePool::new(1);

        let output = [20.0, 20.0, 10.0, 10.0, 0.9, 22.0, 18.0, 0.7];
        let candidates = decoder.decode(&output, (64, 64), &pool).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].keypoints.len(), 1);
        let kp = candidates[0].keypoints[0];
        assert_eq!((kp.x, kp.y), (22, 18));
        assert!((kp.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn oriented_layout_reads_the_angle_slot() {
        let layout = OutputLayout::channel_major_obb(1, 1).unwrap();
        let decoder =
            TensorDecoder::new(layout, labels(1), (64, 64), ResizeMode::Stretched, 0.25).unwrap();
        let pool = CandidatePool::new(1);

        let output = [32.0, 32.0, 16.0, 8.0, 0.8, 0.5];
        let candidates = decoder.decode(&output, (64, 64), &pool).unwrap();

        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].angle - 0.5).abs() < 1e-6);
    }

    #[test]
    fn segment_layout_collects_mask_weights() {
        let layout = OutputLayout::channel_major_segment(1, 1, 3).unwrap();
        let decoder =
            TensorDecoder::new(layout, labels(1), (64, 64), ResizeMode::Stretched, 0.25).unwrap();
        let pool = CandidatePool::new(1);

        let output = [32.0, 32.0, 16.0, 8.0, 0.8, 0.25, -0.5, 1.5];
        let candidates = decoder.decode(&output, (64, 64), &pool).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].mask_weights, vec![0.25, -0.5, 1.5]);
    }

    #[test]
    fn wrong_buffer_length_is_rejected() {
        let layout = OutputLayout::channel_major_detect(2, 2).unwrap();
        let decoder =
            TensorDecoder::new(layout, labels(2), (64, 64), ResizeMode::Stretched, 0.25).unwrap();
        let pool = CandidatePool::new(2);

        let output = [0.0f32; 11];
        assert!(matches!(
            decoder.decode(&output, (64, 64), &pool),
            Err(Error::InvalidShape(_))
        ));
    }

    #[test]
    fn label_table_must_match_layout() {
        let layout = OutputLayout::channel_major_detect(2, 3).unwrap();
        assert!(
            TensorDecoder::new(layout, labels(2), (64, 64), ResizeMode::Stretched, 0.25).is_err()
        );
    }

    #[test]
    fn proportional_mapping_removes_letterbox_padding() {
        // 1280x720 into 640x640: ratio 0.5, y_pad 140, gain 2.
        let layout = OutputLayout::channel_major_detect(1, 1).unwrap();
        let decoder =
            TensorDecoder::new(layout, labels(1), (640, 640), ResizeMode::Proportional, 0.25)
                .unwrap();
        let pool = CandidatePool::new(1);

        let output = [320.0, 320.0, 100.0, 100.0, 0.9];
        let candidates = decoder.decode(&output, (1280, 720), &pool).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].rect, Rect::new(540, 260, 740, 460));
    }
}
