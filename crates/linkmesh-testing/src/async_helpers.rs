//! Async testing utilities.
//!
//! Timeout wrappers and synchronization primitives for exercising
//! linkmesh's event-loop-driven manager without hand-rolled polling loops
//! in every test.

use std::future::Future;
use std::time::Duration;

/// Default timeout for async operations in tests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async function with a timeout.
///
/// # Panics
///
/// Panics if the future does not complete within the timeout.
pub async fn with_timeout<T, F>(timeout: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .expect("test timed out")
}

/// Run an async function with the default timeout.
pub async fn with_default_timeout<T, F>(future: F) -> T
where
    F: Future<Output = T>,
{
    with_timeout(DEFAULT_TIMEOUT, future).await
}

/// Wait for a condition to become true, polling at `interval` until
/// `timeout` elapses.
///
/// # Panics
///
/// Panics if the condition is not met within the timeout.
pub async fn wait_for<F>(timeout: Duration, interval: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while !condition() {
        assert!(start.elapsed() <= timeout, "condition not met within timeout");
        tokio::time::sleep(interval).await;
    }
}

/// As [`wait_for`], but the condition itself is async (e.g. it locks a
/// `ConnectionHandle`).
///
/// # Panics
///
/// Panics if the condition is not met within the timeout.
pub async fn wait_for_async<F, Fut>(timeout: Duration, interval: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();
    loop {
        if condition().await {
            return;
        }
        assert!(start.elapsed() <= timeout, "condition not met within timeout");
        tokio::time::sleep(interval).await;
    }
}

/// Retry an async operation until it succeeds or `max_attempts` is reached.
///
/// # Errors
///
/// Returns the last error if all attempts fail.
pub async fn retry<T, E, F, Fut>(max_attempts: usize, delay: Duration, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 0..max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                last_error = Some(e);
                if attempt < max_attempts - 1 {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(last_error.expect("at least one attempt should have been made"))
}

/// A test latch that can be awaited once, used to signal "the background
/// event loop has processed this" from one task to another.
#[derive(Debug, Default)]
pub struct TestLatch {
    notify: tokio::sync::Notify,
    triggered: std::sync::atomic::AtomicBool,
}

impl TestLatch {
    /// A fresh, untriggered latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the latch, waking any waiters.
    pub fn trigger(&self) {
        self.triggered.store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Wait for the latch to be triggered.
    pub async fn wait(&self) {
        if self.triggered.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        self.notify.notified().await;
    }

    /// Wait for the latch with a timeout; `true` iff it was triggered in
    /// time.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.triggered.load(std::sync::atomic::Ordering::SeqCst) {
            return true;
        }
        tokio::time::timeout(timeout, self.notify.notified()).await.is_ok()
    }

    /// Whether the latch has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result, 42);
    }

    #[tokio::test]
    #[should_panic(expected = "timed out")]
    async fn with_timeout_failure() {
        with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        })
        .await;
    }

    #[tokio::test]
    async fn wait_for_polls_until_condition_holds() {
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter_clone = counter.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            counter_clone.store(5, std::sync::atomic::Ordering::SeqCst);
        });

        wait_for(Duration::from_secs(1), Duration::from_millis(5), || {
            counter.load(std::sync::atomic::Ordering::SeqCst) >= 5
        })
        .await;

        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn retry_succeeds_after_failures() {
        let attempts = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<&str, &str> = retry(3, Duration::from_millis(5), || {
            let attempts = attempts_clone.clone();
            async move {
                let count = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if count < 2 { Err("not yet") } else { Ok("success") }
            }
        })
        .await;

        assert_eq!(result, Ok("success"));
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn latch_releases_waiter_on_trigger() {
        let latch = std::sync::Arc::new(TestLatch::new());
        let latch_clone = latch.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            latch_clone.trigger();
        });

        assert!(!latch.is_triggered());
        latch.wait().await;
        assert!(latch.is_triggered());

        handle.await.unwrap();
    }
}
