//! # Fibonacci Backoff
//!
//! Retry delays for failed reconciliations. Delays grow along the Fibonacci
//! sequence (in whole minutes) and are capped, so a resource stuck on a
//! transient API failure is retried quickly at first without hammering the
//! API server once the failure turns out to be persistent.
//!
//! ```rust
//! use splunk_operator::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(1, 10);
//! let delays: Vec<u64> = (0..8).map(|_| backoff.next_backoff_seconds()).collect();
//! assert_eq!(delays, vec![60, 60, 120, 180, 300, 480, 600, 600]);
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator, one per resource
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    floor: u64,
    ceiling: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    /// `min_minutes` seeds the sequence, `max_minutes` caps it.
    /// A ceiling below the floor is raised to the floor.
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            floor: min_minutes,
            ceiling: max_minutes.max(min_minutes),
            previous: 0,
            current: min_minutes,
        }
    }

    /// Current delay in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let delay = self.current.saturating_mul(60);
        let next = self.previous.saturating_add(self.current).min(self.ceiling);
        self.previous = self.current;
        self.current = next;
        delay
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Back to the first delay, after a successful reconciliation
    pub fn reset(&mut self) {
        self.previous = 0;
        self.current = self.floor;
    }
}
