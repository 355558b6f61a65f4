//! Delay primitives.
//!
//! Two flavors: an asynchronous delay that suspends the calling task, and
//! a true blocking delay for synchronous contexts. The service controller
//! uses the asynchronous one for warm-up waits.

use std::time::Duration;

/// Suspend the current task for at least `duration`.
pub async fn delay(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Block the current thread for at least `duration`.
pub fn delay_blocking(duration: Duration) {
    std::thread::sleep(duration);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_delay_waits_at_least_duration() {
        let start = Instant::now();
        delay(Duration::from_millis(30)).await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_delay_blocking_waits_at_least_duration() {
        let start = Instant::now();
        delay_blocking(Duration::from_millis(10));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
