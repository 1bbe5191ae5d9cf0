//! Retry pacing shared by the mutex and the semaphore.
//!
//! Both primitives poll instead of blocking: after a failed attempt they sleep
//! for a randomized delay so that waiters released at the same moment do not
//! retry in lockstep.

use rand::Rng;
use std::time::{Duration, Instant};

/// Randomized backoff window around a nominal retry delay.
///
/// Every delay is drawn uniformly from `[retry_delay / 2, retry_delay / 2 + retry_delay]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    retry_delay: Duration,
}

impl Backoff {
    /// Create a backoff window around `retry_delay`.
    pub fn new(retry_delay: Duration) -> Self {
        Self { retry_delay }
    }

    /// The nominal retry delay.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Shortest delay `next_delay` can return.
    pub fn min_delay(&self) -> Duration {
        self.retry_delay / 2
    }

    /// Longest delay `next_delay` can return.
    pub fn max_delay(&self) -> Duration {
        self.retry_delay / 2 + self.retry_delay
    }

    /// Draw the next delay from the window.
    pub fn next_delay(&self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    /// Draw the next delay using the given random source.
    pub fn next_delay_with<R: Rng>(&self, rng: &mut R) -> Duration {
        let span = self.retry_delay.as_micros() as u64;
        let jitter = rng.gen_range(0..=span);
        self.min_delay() + Duration::from_micros(jitter)
    }

    /// Sleep for one delay, never past `deadline`.
    pub(crate) fn pause(&self, deadline: &Deadline) {
        let delay = self.next_delay();
        let delay = match deadline.remaining() {
            Some(left) => delay.min(left),
            None => delay,
        };
        std::thread::sleep(delay);
    }
}

/// Optional point in time after which a waiting caller gives up.
///
/// The default deadline never expires, which keeps waits unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub fn never() -> Self {
        Self(None)
    }

    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    /// A deadline `timeout` from now, or one that never expires for `None`.
    pub fn within(timeout: Option<Duration>) -> Self {
        timeout.map_or_else(Self::never, Self::after)
    }

    /// Whether the deadline has passed. Always false for `never()`.
    pub fn expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left before expiry, or `None` for an unbounded deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Whether this deadline can expire at all.
    pub fn is_bounded(&self) -> bool {
        self.0.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn delays_stay_within_window() {
        let backoff = Backoff::new(Duration::from_millis(100));
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..2_000 {
            let delay = backoff.next_delay_with(&mut rng);
            assert!(delay >= Duration::from_millis(50), "too short: {:?}", delay);
            assert!(delay <= Duration::from_millis(150), "too long: {:?}", delay);
        }
    }

    #[test]
    fn delays_cover_both_halves_of_window() {
        let backoff = Backoff::new(Duration::from_millis(100));
        let mut rng = StdRng::seed_from_u64(42);
        let delays: Vec<Duration> = (0..500).map(|_| backoff.next_delay_with(&mut rng)).collect();

        assert!(delays.iter().any(|d| *d < Duration::from_millis(100)));
        assert!(delays.iter().any(|d| *d > Duration::from_millis(100)));
    }

    #[test]
    fn window_bounds_follow_retry_delay() {
        let backoff = Backoff::new(Duration::from_millis(30));
        assert_eq!(backoff.retry_delay(), Duration::from_millis(30));
        assert_eq!(backoff.min_delay(), Duration::from_millis(15));
        assert_eq!(backoff.max_delay(), Duration::from_millis(45));
    }

    #[test]
    fn zero_delay_is_allowed() {
        let backoff = Backoff::new(Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::ZERO);
    }

    #[test]
    fn never_deadline_does_not_expire() {
        let deadline = Deadline::never();
        assert!(!deadline.expired());
        assert!(!deadline.is_bounded());
        assert_eq!(deadline.remaining(), None);
        assert_eq!(Deadline::default(), deadline);
    }

    #[test]
    fn bounded_deadline_expires() {
        let deadline = Deadline::after(Duration::from_millis(20));
        assert!(deadline.is_bounded());
        assert!(!deadline.expired());

        std::thread::sleep(Duration::from_millis(30));
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn optional_timeout_maps_to_deadline() {
        assert_eq!(Deadline::within(None), Deadline::never());

        let deadline = Deadline::within(Some(Duration::from_secs(60)));
        assert!(deadline.is_bounded());
        assert!(!deadline.expired());
    }

    #[test]
    fn pause_is_capped_by_deadline() {
        let backoff = Backoff::new(Duration::from_secs(5));
        let deadline = Deadline::after(Duration::from_millis(20));

        let start = Instant::now();
        backoff.pause(&deadline);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
