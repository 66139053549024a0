//! Minimum-interval rate limiting per named source.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Spaces out calls tagged with the same source name.
///
/// Each caller reserves its slot under the lock and then sleeps outside it,
/// so callers for one source queue up one interval apart while other sources
/// are never held up.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_call: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `min_interval` has passed since the previous call for
    /// `source`. The first call for a source returns immediately.
    pub async fn wait_if_needed(&self, source: &str, min_interval: Duration) {
        let now = Instant::now();
        let slot = self.reserve(source, min_interval, now);

        if slot > now {
            tracing::debug!(
                "Rate limiting {}: waiting {:?}",
                source,
                slot.duration_since(now)
            );
            tokio::time::sleep_until(slot).await;
        }
    }

    fn reserve(&self, source: &str, min_interval: Duration, now: Instant) -> Instant {
        let mut last_call = self.last_call.lock();
        let slot = match last_call.get(source) {
            Some(&previous) => (previous + min_interval).max(now),
            None => now,
        };
        last_call.insert(source.to_string(), slot);
        slot
    }
}
