//! Token bucket limiter for outbound provider calls.
//!
//! Tokens refill continuously at `refill_rate` per second up to `max_tokens`.
//! `acquire` waits cooperatively for a whole token instead of rejecting the
//! caller, so every request eventually goes out at the provider's pace.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Smallest accepted refill rate, in tokens per second
pub const MIN_REFILL_RATE: f64 = 1e-3;

#[derive(Error, Debug, PartialEq)]
pub enum RateLimiterError {
    #[error("max_tokens must be greater than 0")]
    ZeroCapacity,

    #[error("refill_rate must be a finite value >= 0.001 tokens/s (got {0})")]
    InvalidRefillRate(f64),
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, max_tokens: f64, refill_rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(max_tokens);
        self.last_refill = now;
    }
}

/// Token bucket rate limiter
#[derive(Debug)]
pub struct TokenBucket {
    max_tokens: f64,
    refill_rate: f64,
    // Held across the refill wait so concurrent callers queue instead of over-drawing
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket
    pub fn new(max_tokens: u32, refill_rate: f64) -> Result<Self, RateLimiterError> {
        if max_tokens == 0 {
            return Err(RateLimiterError::ZeroCapacity);
        }
        if !refill_rate.is_finite() || refill_rate < MIN_REFILL_RATE {
            return Err(RateLimiterError::InvalidRefillRate(refill_rate));
        }

        Ok(Self {
            max_tokens: max_tokens as f64,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: max_tokens as f64,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Bucket that allows `requests` calls per minute with a burst of `max_tokens`
    pub fn per_minute(max_tokens: u32, requests: u32) -> Result<Self, RateLimiterError> {
        Self::new(max_tokens, requests as f64 / 60.0)
    }

    pub fn max_tokens(&self) -> f64 {
        self.max_tokens
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Wait until one token is available, then take it
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        state.refill(self.max_tokens, self.refill_rate);

        while state.tokens < 1.0 {
            let wait = Duration::from_secs_f64((1.0 - state.tokens) / self.refill_rate);
            debug!("Rate limiter empty, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
            state.refill(self.max_tokens, self.refill_rate);
        }

        state.tokens -= 1.0;
    }

    /// Tokens currently available (after refill)
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill(self.max_tokens, self.refill_rate);
        state.tokens
    }
}
