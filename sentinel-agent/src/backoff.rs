//! Exponential reconnect backoff with session-length reset.

use std::time::{Duration, Instant};

const MAX_DELAY: Duration = Duration::from_secs(30);
const MAX_SHIFT: u32 = 30;
const RESET_THRESHOLD: Duration = Duration::from_secs(60);

pub struct Backoff {
    attempt: u32,
    session_start: Option<Instant>,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            attempt: 0,
            session_start: None,
        }
    }
}

impl Backoff {
    pub fn new() -> Self {
        Backoff::default()
    }

    /// `1, 2, 4, 8, 16, 30, 30, ...` — `base << attempt` clamped to `maxDelay` and to a shift
    /// bound of 30 to avoid overflow.
    pub fn next(&mut self) -> Duration {
        let shift = self.attempt.min(MAX_SHIFT);
        let secs = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        let delay = Duration::from_secs(secs).min(MAX_DELAY);
        self.attempt += 1;
        delay
    }

    pub fn mark_session_start(&mut self) {
        self.session_start = Some(Instant::now());
    }

    /// A session that lasted longer than a minute resets the attempt counter on its next
    /// failure, rather than continuing to back off from wherever it left off.
    pub fn mark_session_end(&mut self) {
        if let Some(start) = self.session_start.take() {
            if start.elapsed() > RESET_THRESHOLD {
                self.attempt = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_matches_literal_scenario() {
        let mut b = Backoff::new();
        let delays: Vec<u64> = (0..6).map(|_| b.next().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30]);
    }

    #[test]
    fn stays_at_max_delay_after_cap() {
        let mut b = Backoff::new();
        for _ in 0..10 {
            b.next();
        }
        assert_eq!(b.next(), MAX_DELAY);
    }

    #[test]
    fn short_session_does_not_reset() {
        let mut b = Backoff::new();
        b.next();
        b.next();
        b.mark_session_start();
        b.mark_session_end();
        assert_eq!(b.next().as_secs(), 4);
    }
}
