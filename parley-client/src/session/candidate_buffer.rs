use parley_core::CandidateDescriptor;
use std::collections::VecDeque;

/// FIFO of candidates held back until they can be used.
#[derive(Debug, Clone, Default)]
pub struct CandidateBuffer {
    queue: VecDeque<CandidateDescriptor>,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: CandidateDescriptor) {
        self.queue.push_back(candidate);
    }

    /// Empties the buffer, yielding candidates in the order they were pushed.
    pub fn drain(&mut self) -> impl Iterator<Item = CandidateDescriptor> + '_ {
        self.queue.drain(..)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateDescriptor> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn to_vec(&self) -> Vec<CandidateDescriptor> {
        self.queue.iter().cloned().collect()
    }
}
