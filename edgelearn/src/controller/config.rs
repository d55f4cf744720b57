//! Runtime configuration of job controllers.

use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::sample::DEFAULT_EVAL_WINDOW_CAPACITY;

/// Default interval between phase ticks (10 seconds).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Default interval between dataset ingestions (10 seconds).
pub const DEFAULT_DATASET_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest tick or ingestion interval accepted.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Default capacity of the worker report queue.
pub const DEFAULT_REPORT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration shared by all job controllers.
///
/// # Example
///
/// ```
/// use edgelearn::controller::ControllerConfig;
/// use std::time::Duration;
///
/// let config = ControllerConfig::new()
///     .with_tick_interval(Duration::from_secs(5))
///     .with_volume_mount_prefix("/rootfs");
/// assert_eq!(config.tick_interval(), Duration::from_secs(5));
/// assert_eq!(config.eval_window_capacity(), 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    tick_interval: Duration,
    dataset_interval: Duration,
    resolve_policy: RetryPolicy,
    eval_window_capacity: usize,
    volume_mount_prefix: String,
    report_channel_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            dataset_interval: DEFAULT_DATASET_INTERVAL,
            resolve_policy: RetryPolicy::default(),
            eval_window_capacity: DEFAULT_EVAL_WINDOW_CAPACITY,
            volume_mount_prefix: String::new(),
            report_channel_capacity: DEFAULT_REPORT_CHANNEL_CAPACITY,
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interval between phase ticks, at least [`MIN_INTERVAL`].
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Sets the interval between dataset ingestions, at least [`MIN_INTERVAL`].
    pub fn with_dataset_interval(mut self, interval: Duration) -> Self {
        self.dataset_interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Sets the bounded-wait policy for datasets and models at job start.
    pub fn with_resolve_policy(mut self, policy: RetryPolicy) -> Self {
        self.resolve_policy = policy;
        self
    }

    /// Sets how many eval windows each job retains.
    pub fn with_eval_window_capacity(mut self, capacity: usize) -> Self {
        self.eval_window_capacity = capacity.max(1);
        self
    }

    /// Sets the prefix under which worker-visible paths are mounted locally.
    ///
    /// Paths sent to workers have it stripped; paths received from workers
    /// get it prepended before local file operations.
    pub fn with_volume_mount_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.volume_mount_prefix = prefix.into();
        self
    }

    /// Sets how many worker reports may queue before senders wait.
    pub fn with_report_channel_capacity(mut self, capacity: usize) -> Self {
        self.report_channel_capacity = capacity.max(1);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn dataset_interval(&self) -> Duration {
        self.dataset_interval
    }

    pub fn resolve_policy(&self) -> RetryPolicy {
        self.resolve_policy
    }

    pub fn eval_window_capacity(&self) -> usize {
        self.eval_window_capacity
    }

    pub fn volume_mount_prefix(&self) -> &str {
        &self.volume_mount_prefix
    }

    pub fn report_channel_capacity(&self) -> usize {
        self.report_channel_capacity
    }
}
