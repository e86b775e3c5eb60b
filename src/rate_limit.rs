//! Spacing between requests to the translation service.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Gate awaited before every request to the translation service.
pub trait RateLimiter: Send + Sync {
    fn acquire(&self) -> BoxFuture<'_, ()>;
}

/// Lets one request through per `interval`.
///
/// The first acquire never waits; each later one waits until `interval` has
/// elapsed since the previous acquire returned.
#[derive(Debug)]
pub struct MinInterval {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl MinInterval {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Reserve the next slot and return when it opens.
    fn reserve(&self) -> Instant {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let slot = match *last {
            Some(previous) => (previous + self.interval).max(now),
            None => now,
        };
        *last = Some(slot);
        slot
    }
}

impl Default for MinInterval {
    fn default() -> Self {
        Self::new(Duration::from_millis(150))
    }
}

impl RateLimiter for MinInterval {
    fn acquire(&self) -> BoxFuture<'_, ()> {
        let slot = self.reserve();
        sleep_until(slot).boxed()
    }
}

/// Never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn acquire(&self) -> BoxFuture<'_, ()> {
        futures::future::ready(()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_does_not_wait() {
        let limiter = MinInterval::new(Duration::from_millis(150));
        let start = Instant::now();

        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_acquires_are_spaced() {
        let limiter = MinInterval::new(Duration::from_millis(150));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_counts_toward_interval() {
        let limiter = MinInterval::new(Duration::from_millis(150));

        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_never_waits() {
        let start = Instant::now();
        for _ in 0..10 {
            Unlimited.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(MinInterval::default().interval(), Duration::from_millis(150));
    }
}
