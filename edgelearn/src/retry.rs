//! Bounded polling for eventually-consistent lookups.
//!
//! Remote resources reach the local caches through a separate sync process,
//! so a job may reference a dataset or model before it is visible. Every such
//! lookup goes through [`poll_until`]: probe, and if nothing is there yet,
//! sleep for a fixed interval and probe again, up to a ceiling.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default interval between probes (100ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default number of probes (300, i.e. 30 seconds at the default interval).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 300;

/// Fixed-interval bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy probing at most `max_attempts` times (at least once).
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound on the time spent waiting.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Why a bounded wait gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RetryError {
    /// Every probe came back empty.
    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// The cancellation token fired while waiting.
    #[error("cancelled while waiting")]
    Cancelled,
}

/// Probes until `probe` yields a value, the policy is exhausted, or `cancel`
/// fires.
///
/// The first probe happens immediately; no sleep follows the last one.
pub async fn poll_until<T, F>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Option<T>,
{
    for attempt in 1..=policy.max_attempts {
        if let Some(value) = probe() {
            return Ok(value);
        }
        if attempt == policy.max_attempts {
            break;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }

    Err(RetryError::Exhausted {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval(), Duration::from_millis(100));
        assert_eq!(policy.max_attempts(), 300);
        assert!(policy.ceiling() <= Duration::from_secs(30));
    }

    #[test]
    fn test_zero_attempts_still_probes_once() {
        assert_eq!(RetryPolicy::new(Duration::ZERO, 0).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_hit() {
        let cancel = CancellationToken::new();
        let result = poll_until(RetryPolicy::default(), &cancel, || Some(7)).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_appears_later() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let probe_calls = Arc::clone(&calls);

        let result = poll_until(RetryPolicy::default(), &cancel, move || {
            let n = probe_calls.fetch_add(1, Ordering::SeqCst) + 1;
            (n == 5).then_some("ready")
        })
        .await;

        assert_eq!(result, Ok("ready"));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_ceiling() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<(), _> = poll_until(RetryPolicy::default(), &cancel, || {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        })
        .await;

        assert_eq!(result, Err(RetryError::Exhausted { attempts: 300 }));
        assert_eq!(calls.load(Ordering::SeqCst), 300);
        assert!(start.elapsed() <= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_waiting() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), _> = poll_until(RetryPolicy::default(), &cancel, || None).await;
        assert_eq!(result, Err(RetryError::Cancelled));
    }
}
