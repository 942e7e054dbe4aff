pub mod annotate;
pub mod bbox;
pub mod decoder;
pub mod detection;
pub mod error;
pub mod layout;
pub mod mapping;
pub mod mask;
pub mod nms;
pub mod pool;
pub mod tracker;

mod kalman;
mod lapjv;
mod tail;

pub use bbox::{Rect, RectF};
pub use decoder::TensorDecoder;
pub use detection::{Candidate, Detection, KeyPoint, Label, TrackingInfo};
pub use error::Error;
pub use layout::{OutputLayout, ScoreEncoding};
pub use mapping::{CoordinateMapper, ResizeMode};
pub use mask::{BitMask, MaskReconstructor};
pub use nms::NonMaxSuppressor;
pub use pool::{CandidateBuffer, CandidatePool};
pub use tracker::{SortTracker, SortTrackerConfig};

#[cfg(test)]
mod tests {
    use super::*;

    /// Full postprocessing pass: decode, suppress, resolve, track.
    #[test]
    fn decoded_candidates_flow_through_nms_and_tracking() {
        let layout = OutputLayout::channel_major_detect(3, 2).unwrap();
        let labels = vec![
            Label::new(0, "person", "#ff0000"),
            Label::new(1, "car", "#0000ff"),
        ];
        let decoder = TensorDecoder::new(
            layout,
            labels,
            (64, 64),
            ResizeMode::Stretched,
            0.25,
        )
        .unwrap();
        let pool = CandidatePool::new(layout.max_candidates());
        let nms = NonMaxSuppressor::new(0.45);
        let mut tracker = SortTracker::new(SortTrackerConfig::default());

        // Predictions 0 and 1 overlap heavily; 2 stands alone.
        let output = [
            20.0, 21.0, 50.0, // cx
            20.0, 21.0, 50.0, // cy
            10.0, 10.0, 8.0, // w
            10.0, 10.0, 8.0, // h
            0.9, 0.8, 0.1, // person scores
            0.1, 0.2, 0.7, // car scores
        ];

        let mut candidates = decoder.decode(&output, (64, 64), &pool).unwrap();
        assert_eq!(candidates.len(), 3);

        nms.suppress(&mut candidates);
        assert_eq!(candidates.len(), 2);

        let mut detections = decoder.detections(&candidates);
        tracker.track(&mut detections).unwrap();

        assert_eq!(detections[0].label.name, "person");
        assert_eq!(detections[1].label.name, "car");
        assert!(detections.iter().all(|d| d.tracking.is_some()));
    }

    /// Segmentation path: decoded mask weights feed the reconstructor and
    /// the finished mask rides on the detection.
    #[test]
    fn segment_weights_reconstruct_into_a_mask() {
        let layout = OutputLayout::channel_major_segment(1, 1, 2).unwrap();
        let labels = vec![Label::new(0, "person", "#ff0000")];
        let decoder =
            TensorDecoder::new(layout, labels, (64, 64), ResizeMode::Stretched, 0.25).unwrap();
        let pool = CandidatePool::new(1);
        let reconstructor = MaskReconstructor::new((64, 64), (16, 16), 2).unwrap();

        let output = [32.0, 32.0, 16.0, 16.0, 0.9, 1.0, 1.0];
        let candidates = decoder.decode(&output, (64, 64), &pool).unwrap();
        assert_eq!(candidates.len(), 1);

        let proto = ndarray::Array3::from_elem((2, 16, 16), 2.0f32);
        let mask = reconstructor
            .reconstruct(
                proto.view(),
                &candidates[0].mask_weights,
                candidates[0].model_rect,
                candidates[0].rect,
                0.5,
            )
            .unwrap();

        let mut detections = decoder.detections(&candidates);
        detections[0].mask = Some(mask);

        let m = detections[0].mask.as_ref().unwrap();
        assert_eq!((m.width(), m.height()), (16, 16));
        assert_eq!(m.count_ones(), 16 * 16);
    }
}
