//! # Fibonacci Backoff
//!
//! Progressive backoff used by the error policy when a reconciliation fails
//! with a store error. It grows more slowly than exponential backoff.
//!
//! ## Usage
//!
//! ```rust
//! use cloudsecret_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(5, 60);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 10);
//! assert_eq!(backoff.next_backoff_seconds(), 15);
//! assert_eq!(backoff.next_backoff_seconds(), 25);
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, starting from `min_secs`
/// twice and capped at `max_secs`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with the given bounds in seconds
    ///
    /// A `min_secs` of zero is raised to one second so the sequence grows.
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        let max_secs = max_secs.max(min_secs);
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        result
    }

    /// Get the next backoff duration as a `Duration` and advance the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::new(5, 300);
        let sequence: Vec<u64> = (0..9).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(sequence, vec![5, 5, 10, 15, 25, 40, 65, 105, 170]);
    }

    #[test]
    fn test_fibonacci_backoff_max_cap() {
        let mut backoff = FibonacciBackoff::new(5, 30);
        let sequence: Vec<u64> = (0..8).map(|_| backoff.next_backoff_seconds()).collect();
        // 5, 5, 10, 15, 25, then capped at 30
        assert_eq!(sequence, vec![5, 5, 10, 15, 25, 30, 30, 30]);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::new(5, 300);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();

        backoff.reset();

        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
    }

    #[test]
    fn test_fibonacci_backoff_degenerate_bounds() {
        let mut zero = FibonacciBackoff::new(0, 0);
        assert_eq!(zero.next_backoff_seconds(), 1);
        assert_eq!(zero.next_backoff_seconds(), 1);

        // min above max: max is raised to min
        let mut inverted = FibonacciBackoff::new(10, 5);
        assert_eq!(inverted.next_backoff_seconds(), 10);
        assert_eq!(inverted.next_backoff_seconds(), 10);
    }

    #[test]
    fn test_fibonacci_backoff_inverted_bounds_reset_matches_fresh() {
        let mut fresh = FibonacciBackoff::new(10, 5);
        let first: Vec<u64> = (0..4).map(|_| fresh.next_backoff_seconds()).collect();

        fresh.reset();
        let after_reset: Vec<u64> = (0..4).map(|_| fresh.next_backoff_seconds()).collect();

        assert_eq!(first, vec![10, 10, 10, 10]);
        assert_eq!(after_reset, first);
    }
}
