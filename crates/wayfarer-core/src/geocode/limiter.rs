//! Request pacing for the upstream geocoder.

use crate::error::{Result, WayfarerError};
use std::thread;
use std::time::{Duration, Instant};

/// Enforces a minimum interval between upstream calls.
///
/// The limiter is an owned value threaded through the cache rather than
/// global state, so tests can construct a zero-interval limiter and the
/// pipeline can hold exactly one per geocoder endpoint.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// One request per `secs` seconds. Nominatim's usage policy allows
    /// at most one request per second.
    pub fn per_second(secs: f64) -> Self {
        Self::new(Duration::from_secs_f64(secs.max(0.0)))
    }

    /// Block until the minimum interval since the previous acquire has
    /// elapsed, then record this call.
    pub fn acquire(&mut self) -> Result<()> {
        let now = Instant::now();
        if let Some(last) = self.last_call {
            let elapsed = now.duration_since(last);
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
            let since = last.elapsed();
            if since < self.min_interval {
                // Sleep came back early; surface it instead of hitting the
                // upstream too fast.
                return Err(WayfarerError::RateLimitViolation {
                    elapsed_ms: since.as_millis() as u64,
                });
            }
        }
        self.last_call = Some(Instant::now());
        Ok(())
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
