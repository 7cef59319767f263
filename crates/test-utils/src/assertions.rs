//! Polling assertions for async tests.

use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Default polling interval for [`assert_eventually`].
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it holds or `timeout` expires.
///
/// Returns whether the condition held. Useful when a spawned request must
/// reach a collaborator before the test continues.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use conductor_test_utils::assert_eventually;
///
/// # async fn example(submitted: impl Fn() -> usize) {
/// let reached = assert_eventually(Duration::from_secs(1), || submitted() == 1).await;
/// assert!(reached, "submission should reach the engine");
/// # }
/// ```
pub async fn assert_eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(DEFAULT_POLL_INTERVAL).await;
    }

    condition()
}
