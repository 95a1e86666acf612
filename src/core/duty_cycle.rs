//! Duty cycles are rolling fractions of recent ticks on which a column met some criterion.
//!
//! Every column keeps two histories: whether its overlap survived `min_overlap` (overlap duty)
//! and whether it won inhibition (active duty). A history is a fixed-capacity ring buffer, so
//! the duty cycle always reflects the last `capacity` ticks and memory stays bounded.

use std::collections::VecDeque;

/// Fixed-capacity record of the most recent boolean outcomes.
#[derive(Debug, Clone)]
pub struct DutyCycleHistory {
    records: VecDeque<bool>,
    hits: usize,
    capacity: usize,
}

impl DutyCycleHistory {
    /// Creates an empty history holding at most `capacity` records (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            hits: 0,
            capacity,
        }
    }

    /// Appends an outcome, evicting the oldest one when full.
    pub fn record(&mut self, hit: bool) {
        if self.records.len() == self.capacity {
            if let Some(true) = self.records.pop_front() {
                self.hits -= 1;
            }
        }
        self.records.push_back(hit);
        if hit {
            self.hits += 1;
        }
    }

    /// Fraction of recorded outcomes that were hits. An empty history has a duty cycle of zero.
    #[inline]
    pub fn duty_cycle(&self) -> f32 {
        if self.records.is_empty() {
            0.0
        } else {
            self.hits as f32 / self.records.len() as f32
        }
    }

    /// The most recent outcome, if any.
    #[inline]
    pub fn last(&self) -> Option<bool> {
        self.records.back().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
