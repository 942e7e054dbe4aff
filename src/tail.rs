use std::collections::VecDeque;

/// Bounded centroid history of one track, oldest point first. Pushing onto
/// a full tail evicts the oldest point.
#[derive(Debug, Clone)]
pub struct Tail {
    deque: VecDeque<(f32, f32)>,
    capacity: usize,
}

impl Tail {
    #[inline]
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            deque: VecDeque::with_capacity(cap),
            capacity: cap,
        }
    }

    #[inline]
    pub fn push(&mut self, point: (f32, f32)) -> Option<(f32, f32)> {
        let evicted = if self.is_full() {
            self.deque.pop_front()
        } else {
            None
        };

        if self.capacity > 0 {
            self.deque.push_back(point);
        }

        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deque.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deque.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.deque.len() == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Owned copy of the history, oldest first.
    pub fn snapshot(&self) -> Vec<(f32, f32)> {
        self.deque.iter().copied().collect()
    }
}
