use std::collections::BTreeMap;

use crate::foundation::core::FrameIndex;

/// Resequences out-of-order worker output into strictly ascending frame order.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    end: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> ReorderBuffer<T> {
    /// Buffer expecting every index in `start..end` exactly once.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            next: start,
            end,
            pending: BTreeMap::new(),
        }
    }

    /// Park an item. Duplicates and indices outside the range are dropped and reported as `false`.
    pub fn insert(&mut self, idx: FrameIndex, item: T) -> bool {
        if idx.0 < self.next || idx.0 >= self.end || self.pending.contains_key(&idx.0) {
            return false;
        }
        self.pending.insert(idx.0, item);
        true
    }

    /// Next item in order, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<(FrameIndex, T)> {
        let item = self.pending.remove(&self.next)?;
        let idx = FrameIndex(self.next);
        self.next += 1;
        Some((idx, item))
    }

    /// Index the buffer is waiting for.
    pub fn next_index(&self) -> FrameIndex {
        FrameIndex(self.next)
    }

    /// `true` once every index in the range was popped.
    pub fn is_complete(&self) -> bool {
        self.next >= self.end
    }

    /// Items parked behind a gap.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
