//! Facts a trigger rule is evaluated against.

use std::collections::HashMap;

/// Fact name holding the number of buffered train samples.
pub const NUM_OF_SAMPLES: &str = "num_of_samples";

/// Suffix of facts holding per-metric deltas between evaluations.
pub const DELTA_SUFFIX: &str = "_delta";

/// Value of a single fact.
#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    /// A count, e.g. number of samples.
    Count(u64),
    /// A numeric series, e.g. per-class precision.
    Series(Vec<f64>),
}

impl From<usize> for FactValue {
    fn from(n: usize) -> Self {
        FactValue::Count(n as u64)
    }
}

impl From<u64> for FactValue {
    fn from(n: u64) -> Self {
        FactValue::Count(n)
    }
}

impl From<Vec<f64>> for FactValue {
    fn from(v: Vec<f64>) -> Self {
        FactValue::Series(v)
    }
}

/// Named facts for one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facts {
    values: HashMap<String, FactValue>,
}

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fact, replacing any fact of the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FactValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FactValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FactValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Builds deploy facts from the newest and previous evaluation metrics.
    ///
    /// For each metric of `new` two facts are produced: the raw values under
    /// the metric name and `new[i] - old[i]` under `<metric>_delta`. Values
    /// without a counterpart in `old` yield no delta entry.
    pub fn from_metric_delta(
        new: &HashMap<String, Vec<f64>>,
        old: &HashMap<String, Vec<f64>>,
    ) -> Self {
        let mut facts = Facts::new();
        for (metric, values) in new {
            let previous = old.get(metric).map(Vec::as_slice).unwrap_or(&[]);
            let delta: Vec<f64> = values
                .iter()
                .zip(previous.iter())
                .map(|(n, o)| n - o)
                .collect();
            facts.insert(metric.clone(), values.clone());
            facts.insert(format!("{}{}", metric, DELTA_SUFFIX), delta);
        }
        facts
    }
}
