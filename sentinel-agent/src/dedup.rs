//! Request-id deduplication for the receive loop.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

const PRUNE_AGE: Duration = Duration::from_secs(5 * 60);
const CAPACITY_BOUND: usize = 10_000;

#[derive(Default)]
pub struct Dedup {
    seen: Mutex<HashMap<String, Instant>>,
}

impl Dedup {
    pub fn new() -> Self {
        Dedup::default()
    }

    /// `IsSeen(id)`: empty ids are never deduplicated. First sighting returns `false`;
    /// every subsequent call with the same id returns `true` until pruned.
    pub async fn is_seen(&self, request_id: &str) -> bool {
        if request_id.is_empty() {
            return false;
        }

        let mut seen = self.seen.lock().await;
        if seen.contains_key(request_id) {
            return true;
        }

        seen.insert(request_id.to_string(), Instant::now());
        if seen.len() > CAPACITY_BOUND {
            let now = Instant::now();
            seen.retain(|_, first_seen| now.duration_since(*first_seen) < PRUNE_AGE);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_sighting_false_then_true() {
        let dedup = Dedup::new();
        assert!(!dedup.is_seen("r1").await);
        assert!(dedup.is_seen("r1").await);
        assert!(dedup.is_seen("r1").await);
    }

    #[tokio::test]
    async fn empty_id_never_deduplicated() {
        let dedup = Dedup::new();
        assert!(!dedup.is_seen("").await);
        assert!(!dedup.is_seen("").await);
    }
}
