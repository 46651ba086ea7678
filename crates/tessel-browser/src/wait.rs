//! Polling waits with a timeout.

use crate::error::{BrowserError, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Default timeout for wait operations (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default poll interval for checking conditions (50ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Maximum time to wait for the condition.
    pub timeout: Duration,

    /// How often to check if the condition is satisfied.
    pub poll_interval: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Custom timeout with the default poll interval.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

/// Poll `condition` until it returns `Ok(true)` or the timeout expires.
///
/// Errors from the condition count as "not yet": a page that is still
/// navigating may fail evaluations transiently.
pub async fn wait_for_result<F, Fut>(condition: F, config: WaitConfig, description: &str) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();

    loop {
        if let Ok(true) = condition().await {
            return Ok(());
        }

        if start.elapsed() >= config.timeout {
            return Err(BrowserError::WaitTimeout {
                condition: description.to_string(),
                timeout: config.timeout,
            });
        }

        sleep(config.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn wait_succeeds_after_transient_errors() {
        let counter = Arc::new(AtomicU32::new(0));
        let polls = counter.clone();

        let result = wait_for_result(
            move || {
                let polls = polls.clone();
                async move {
                    match polls.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(BrowserError::ScriptExecutionFailed("navigating".into())),
                        1 => Ok(false),
                        _ => Ok(true),
                    }
                }
            },
            WaitConfig::new(Duration::from_secs(5), Duration::from_millis(1)),
            "third poll",
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn wait_times_out() {
        let result = wait_for_result(
            || async { Ok(false) },
            WaitConfig::new(Duration::from_millis(50), Duration::from_millis(5)),
            "impossible condition",
        )
        .await;

        assert!(
            matches!(result, Err(BrowserError::WaitTimeout { ref condition, .. }) if condition == "impossible condition")
        );
    }
}
