//! Train/eval partitioning of a growing dataset.
//!
//! The dataset only ever grows. Each ingestion looks at the samples that
//! arrived since the last one, sends a `train_prob` share of them to the train
//! bucket and the remainder to a fresh eval window. Eval windows are kept for
//! a bounded number of versions; the oldest is dropped first.
//!
//! # Accounting
//!
//! Every sample seen lands in exactly one place:
//!
//! ```text
//! numbers_seen == train_samples + consumed_train + Σ eval_windows + evicted_eval
//! ```
//!
//! `consumed_train` counts train samples cleared after a train trigger used
//! them; `evicted_eval` counts samples of eval windows dropped for capacity.

use std::collections::VecDeque;

/// Default number of eval windows retained.
pub const DEFAULT_EVAL_WINDOW_CAPACITY: usize = 5;

/// Outcome of a single [`SampleWindow::ingest`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestStats {
    /// Samples appended to the train bucket.
    pub train: usize,
    /// Samples appended as a new eval window.
    pub eval: usize,
    /// Eval windows dropped to stay within capacity.
    pub evicted_windows: usize,
}

impl IngestStats {
    /// Whether any new sample was partitioned.
    pub fn is_empty(&self) -> bool {
        self.train == 0 && self.eval == 0
    }
}

/// Bounded-memory train/eval split of a growing sample list.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    numbers_seen: usize,
    train_samples: Vec<String>,
    eval_windows: VecDeque<Vec<String>>,
    eval_samples_flat: Vec<String>,
    capacity: usize,
    consumed_train: usize,
    evicted_eval: usize,
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_EVAL_WINDOW_CAPACITY)
    }
}

impl SampleWindow {
    /// Creates an empty window retaining at most `capacity` eval windows.
    pub fn new(capacity: usize) -> Self {
        Self {
            numbers_seen: 0,
            train_samples: Vec::new(),
            eval_windows: VecDeque::new(),
            eval_samples_flat: Vec::new(),
            capacity: capacity.max(1),
            consumed_train: 0,
            evicted_eval: 0,
        }
    }

    /// Partitions samples that arrived since the last call.
    ///
    /// `samples` is the full, ordered sample list of the dataset; only the
    /// tail beyond `numbers_seen` is looked at. A list that shrank is ignored.
    /// `train_prob` is clamped to `0.0..=1.0`; the train share is
    /// `floor(train_prob * new_count)`, taken from the head of the new
    /// samples. The eval share always becomes a new window, even when empty,
    /// so each ingestion with new samples counts as one eval version.
    pub fn ingest(&mut self, samples: &[String], train_prob: f64) -> IngestStats {
        if samples.len() <= self.numbers_seen {
            return IngestStats::default();
        }

        let new_samples = &samples[self.numbers_seen..];
        let prob = if train_prob.is_nan() {
            0.0
        } else {
            train_prob.clamp(0.0, 1.0)
        };
        let train_count = ((prob * new_samples.len() as f64).floor() as usize).min(new_samples.len());
        let (train, eval) = new_samples.split_at(train_count);

        self.train_samples.extend_from_slice(train);

        let mut stats = IngestStats {
            train: train.len(),
            eval: eval.len(),
            evicted_windows: 0,
        };

        self.eval_windows.push_back(eval.to_vec());
        stats.evicted_windows = self.evict_over_capacity();
        self.flatten_eval();

        self.numbers_seen = samples.len();
        stats
    }

    /// Recomputes the flat eval sample list from the retained windows.
    pub fn flatten_eval(&mut self) {
        self.eval_samples_flat = self.eval_windows.iter().flatten().cloned().collect();
    }

    /// Clears buffered train samples after a train trigger consumed them.
    ///
    /// Counts are kept; consumed samples are never partitioned again.
    pub fn clear_train(&mut self) {
        self.consumed_train += self.train_samples.len();
        self.train_samples.clear();
    }

    /// Drops the oldest eval windows while more than `capacity` are retained.
    ///
    /// Returns the number of windows dropped.
    pub fn evict_over_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.eval_windows.len() > self.capacity {
            if let Some(oldest) = self.eval_windows.pop_front() {
                self.evicted_eval += oldest.len();
                evicted += 1;
            }
        }
        if evicted > 0 {
            self.flatten_eval();
        }
        evicted
    }

    /// Number of dataset samples already partitioned.
    pub fn numbers_seen(&self) -> usize {
        self.numbers_seen
    }

    /// Buffered train samples not yet consumed.
    pub fn train_samples(&self) -> &[String] {
        &self.train_samples
    }

    /// Retained eval windows, oldest first.
    pub fn eval_windows(&self) -> impl Iterator<Item = &Vec<String>> {
        self.eval_windows.iter()
    }

    /// Number of retained eval windows.
    pub fn eval_window_count(&self) -> usize {
        self.eval_windows.len()
    }

    /// Concatenation of all retained eval windows.
    pub fn eval_samples(&self) -> &[String] {
        &self.eval_samples_flat
    }

    /// Maximum number of retained eval windows.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples accounted for, including consumed and evicted ones.
    ///
    /// Always equal to [`numbers_seen`](Self::numbers_seen).
    pub fn accounted(&self) -> usize {
        let retained_eval: usize = self.eval_windows.iter().map(Vec::len).sum();
        self.train_samples.len() + self.consumed_train + retained_eval + self.evicted_eval
    }
}
