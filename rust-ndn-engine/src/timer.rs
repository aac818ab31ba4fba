//! Time source shared by the engine and its users.

use rand::Rng;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Clock, sleep and nonce provider. Wraps the tokio timer so the wait
/// points in the stack all go through one place.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer;

impl Timer {
    pub fn new() -> Self {
        Self
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Milliseconds since the Unix epoch, for timestamp components.
    pub fn timestamp_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    pub async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// A fresh random Interest nonce.
    pub fn nonce(&self) -> u32 {
        rand::thread_rng().gen()
    }
}
