use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use crate::detection::Candidate;

/// Reusable candidate buffers, one rented per decode call.
///
/// Buffers come back cleared unconditionally when the guard drops, so a
/// rented buffer never exposes candidates from a previous frame.
#[derive(Debug)]
pub struct CandidatePool {
    buffers: Mutex<Vec<Vec<Candidate>>>,
    capacity: usize,
}

impl CandidatePool {
    /// `capacity` should be the maximum candidate count one tensor can
    /// yield, see [`OutputLayout::max_candidates`](crate::layout::OutputLayout::max_candidates).
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            capacity,
        }
    }

    pub fn rent(&self) -> CandidateBuffer<'_> {
        let buf = match self.buffers.lock() {
            Ok(mut buffers) => buffers.pop(),
            // A poisoned pool just allocates fresh buffers from here on.
            Err(_) => None,
        };

        CandidateBuffer {
            pool: self,
            buf: buf.unwrap_or_else(|| Vec::with_capacity(self.capacity)),
        }
    }

    fn give_back(&self, mut buf: Vec<Candidate>) {
        buf.clear();
        if let Ok(mut buffers) = self.buffers.lock() {
            buffers.push(buf);
        }
    }
}

/// RAII handle over a rented buffer. Dereferences to `Vec<Candidate>`.
#[derive(Debug)]
pub struct CandidateBuffer<'a> {
    pool: &'a CandidatePool,
    buf: Vec<Candidate>,
}

impl Deref for CandidateBuffer<'_> {
    type Target = Vec<Candidate>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for CandidateBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for CandidateBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}
