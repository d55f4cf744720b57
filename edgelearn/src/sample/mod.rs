//! Dataset sample bookkeeping.

mod window;

pub use window::{IngestStats, SampleWindow, DEFAULT_EVAL_WINDOW_CAPACITY};
