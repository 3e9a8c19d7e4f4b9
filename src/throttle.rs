//! Minimum spacing between calls to one upstream.

use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Hands out call slots at least `spacing` (plus random jitter) apart.
///
/// Concurrent callers reserve consecutive slots under the lock and then sleep
/// outside it, so the spacing holds however many tasks share the throttle.
pub struct Throttle {
    spacing: Duration,
    jitter: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Creates a throttle from millisecond settings.
    pub fn new(delay_ms: u64, delay_jitter_ms: u64) -> Self {
        Self {
            spacing: Duration::from_millis(delay_ms),
            jitter: Duration::from_millis(delay_jitter_ms),
            next_slot: Mutex::new(None),
        }
    }

    /// A throttle that never waits.
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    pub fn is_disabled(&self) -> bool {
        self.spacing.is_zero() && self.jitter.is_zero()
    }

    /// Waits until this caller's slot comes up.
    pub async fn wait(&self) {
        if self.is_disabled() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.spacing + self.random_jitter());
            slot
        };

        let now = Instant::now();
        if slot > now {
            debug!("Throttling {}ms", (slot - now).as_millis());
            tokio::time::sleep_until(slot).await;
        }
    }

    fn random_jitter(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max))
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::disabled()
    }
}
