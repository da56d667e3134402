//! Bounded log of committed store actions.

use super::{StoreAction, StoreState};
use std::collections::VecDeque;
use std::sync::Arc;

/// One committed action and the state it produced.
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub action: StoreAction,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub state: Arc<StoreState>,
}

/// Ring buffer of [`HistoryRecord`]s; the oldest record is evicted first.
#[derive(Debug, Clone)]
pub struct ActionHistory {
    capacity: usize,
    records: VecDeque<HistoryRecord>,
}

impl ActionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn push(&mut self, record: HistoryRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
