use log::debug;
use ndarray::Array2;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::Rect;
use crate::detection::{Detection, TrackingInfo};
use crate::error::Error;
use crate::kalman::KalmanFilter;
use crate::lapjv;
use crate::tail::Tail;

/// SORT tracker tuning knobs.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct SortTrackerConfig {
    /// A track/detection pair is only accepted below this combined cost.
    pub cost_threshold: f32,
    /// Consecutive unmatched frames before a track is dropped.
    pub max_age: u32,
    /// Centroid history length carried per track.
    pub tail_length: usize,
}

impl Default for SortTrackerConfig {
    fn default() -> Self {
        Self {
            cost_threshold: 0.5,
            max_age: 3,
            tail_length: 30,
        }
    }
}

#[derive(Debug)]
struct Track {
    id: u64,
    filter: KalmanFilter,
    last_rect: Rect,
    age: u32,
    tail: Tail,
}

/// Frame-to-frame identity tracker over finished detections.
///
/// Matching cost per track/detection pair is `(1 - IoU)` of the track's last
/// box against the detection box, plus the distance between the track's
/// predicted centroid and the detection centroid scaled down by 100. Pairs
/// are resolved globally with a Jonker-Volgenant assignment.
#[derive(Debug)]
pub struct SortTracker {
    config: SortTrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl SortTracker {
    pub fn new(config: SortTrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    /// Attach track identities to this frame's detections.
    ///
    /// An empty frame leaves all tracks untouched; their ages only advance
    /// on frames that carry detections. Matched detections receive the
    /// track's tail as it stood before this frame's centroid is recorded.
    pub fn track(&mut self, detections: &mut [Detection]) -> Result<(), Error> {
        if detections.is_empty() {
            return Ok(());
        }

        if self.tracks.is_empty() {
            for det in detections.iter_mut() {
                self.spawn(det);
            }
            return Ok(());
        }

        for track in &mut self.tracks {
            track.filter.predict();
        }

        let mut cost = Array2::<f32>::zeros((self.tracks.len(), detections.len()));
        for (t, track) in self.tracks.iter().enumerate() {
            let (px, py) = track.filter.position();
            for (d, det) in detections.iter().enumerate() {
                let (cx, cy) = det.centroid();
                let distance = (px - cx).hypot(py - cy);
                cost[(t, d)] = (1.0 - track.last_rect.iou(&det.rect)) + distance / 100.0;
            }
        }

        let assignment = lapjv::solve(cost.view())?;

        let mut det_matched = vec![false; detections.len()];
        for (t, col) in assignment.iter().enumerate() {
            match *col {
                Some(d) if cost[(t, d)] < self.config.cost_threshold => {
                    det_matched[d] = true;

                    let det = &mut detections[d];
                    let (cx, cy) = det.centroid();
                    let track = &mut self.tracks[t];

                    det.tracking = Some(TrackingInfo {
                        id: track.id,
                        tail: track.tail.snapshot(),
                    });
                    track.filter.update(cx, cy);
                    track.tail.push((cx, cy));
                    track.last_rect = det.rect;
                    track.age = 0;
                }
                _ => self.tracks[t].age += 1,
            }
        }

        let max_age = self.config.max_age;
        self.tracks.retain(|track| {
            if track.age >= max_age {
                debug!(
                    "track {} expired after {} unmatched frames",
                    track.id, track.age
                );
                false
            } else {
                true
            }
        });

        for (d, det) in detections.iter_mut().enumerate() {
            if !det_matched[d] {
                self.spawn(det);
            }
        }

        Ok(())
    }

    /// Create a fresh track for an unmatched detection. IDs are monotonic
    /// and never reused.
    fn spawn(&mut self, det: &mut Detection) {
        let id = self.next_id;
        self.next_id += 1;

        let (cx, cy) = det.centroid();
        let mut tail = Tail::with_capacity(self.config.tail_length);
        det.tracking = Some(TrackingInfo {
            id,
            tail: tail.snapshot(),
        });
        tail.push((cx, cy));

        self.tracks.push(Track {
            id,
            filter: KalmanFilter::new(cx, cy),
            last_rect: det.rect,
            age: 0,
            tail,
        });
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }
}
