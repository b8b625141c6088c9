//! Exponential backoff for upstream reconnects.

use std::time::Duration;

/// Reconnect delay state for one local connection.
///
/// Each call to [`Backoff::next_delay`] yields the current delay and then
/// doubles it, capped at the maximum.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial.min(max),
        }
    }

    /// Delay to wait now; advances the state for the next call.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Delay the next call to [`Backoff::next_delay`] will return.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Go back to the initial delay.
    pub fn reset(&mut self) {
        self.current = self.initial.min(self.max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Delay before attempt `attempt` (1-based): `min(base * 2^(attempt-1), max)`.
    fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let exponential_base = 2u64.saturating_pow(attempt - 1);
        let delay_ms = base_ms.saturating_mul(exponential_base);
        Duration::from_millis(delay_ms.min(max_ms))
    }

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);
        assert_eq!(calculate_backoff(1, 100, 2000).as_millis(), 100);
        assert_eq!(calculate_backoff(2, 100, 2000).as_millis(), 200);
        assert_eq!(calculate_backoff(10, 100, 1000).as_millis(), 1000);
        assert_eq!(calculate_backoff(200, 100, 1000).as_millis(), 1000);
    }

    #[test]
    fn nth_wait_matches_formula() {
        let (d, max) = (2_000, 20_000);
        let mut backoff = Backoff::new(Duration::from_millis(d), Duration::from_millis(max));
        for n in 1..=8 {
            assert_eq!(backoff.next_delay(), calculate_backoff(n, d, max), "wait #{}", n);
        }
    }

    #[test]
    fn grows_then_caps() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(20));
        let waits: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(waits, vec![2, 4, 8, 16, 20, 20]);
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(20));
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.current(), Duration::from_secs(8));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}
