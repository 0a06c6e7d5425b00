//! Trailing window of actions the motors have effected.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One effected action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Monotonic position in the history, starting at 1.
    pub seq: u64,
    pub label: String,
    /// Id of the codelet whose proposal was effected.
    pub producer: String,
    pub timestamp: i64,
}

/// Bounded action history; the oldest record is evicted first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionHistory {
    capacity: usize,
    last_seq: u64,
    records: VecDeque<ActionRecord>,
}

impl ActionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            last_seq: 0,
            records: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an action and return its sequence number.
    pub fn push(&mut self, label: impl Into<String>, producer: impl Into<String>) -> u64 {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.last_seq += 1;
        self.records.push_back(ActionRecord {
            seq: self.last_seq,
            label: label.into(),
            producer: producer.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
        self.last_seq
    }

    /// Labels, oldest first.
    pub fn labels(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.label.as_str()).collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &ActionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&ActionRecord> {
        self.records.back()
    }

    /// Sequence number of the newest record (0 when nothing was recorded).
    pub fn last_seq(&self) -> u64 {
        self.last_seq
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
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::new(32)
    }
}
