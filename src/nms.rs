use crate::detection::Candidate;

/// Greedy non-maximum suppression over decoded candidates.
///
/// Candidates are sorted by descending confidence with a stable sort, so
/// equal-confidence candidates keep their decode order. A candidate is kept
/// when its IoU against every already-kept candidate stays at or below the
/// threshold. Suppression is class-agnostic.
#[derive(Debug, Copy, Clone)]
pub struct NonMaxSuppressor {
    iou_threshold: f32,
}

impl NonMaxSuppressor {
    pub fn new(iou_threshold: f32) -> Self {
        Self { iou_threshold }
    }

    /// Filter `candidates` in place, leaving only the kept ones in
    /// descending confidence order.
    pub fn suppress(&self, candidates: &mut Vec<Candidate>) {
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut kept = 0;
        for i in 0..candidates.len() {
            let accept = (0..kept).all(|k| candidates[k].rect.iou(&candidates[i].rect) <= self.iou_threshold);
            if accept {
                candidates.swap(kept, i);
                kept += 1;
            }
        }

        candidates.truncate(kept);
    }
}
