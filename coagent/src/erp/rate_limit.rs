//! Client-side token bucket for ERP calls.
//!
//! Capacity `C`, refill `R` tokens/sec. Each call refills by `elapsed·R`
//! (capped at `C`), then consumes one token or sleeps out the shortfall.
//! The bucket lock is held across the sleep, so waiters drain first-come
//! first-served.

use std::time::Instant;

use tokio::sync::Mutex;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket; one per ERP adapter instance.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate: refill_rate.max(f64::MIN_POSITIVE),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_refill = Instant::now();
    }

    /// Takes one token, sleeping until one is available.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return;
        }
        let wait_ms = ((1.0 - state.tokens) / self.refill_rate * 1000.0).ceil() as u64;
        tracing::debug!(wait_ms, "rate limit: waiting for token");
        tokio::time::sleep(std::time::Duration::from_millis(wait_ms)).await;
        self.refill(&mut state);
        state.tokens = (state.tokens - 1.0).max(0.0);
    }

    /// Current token count (after a refill); for tests and monitoring.
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    /// **Scenario**: Up to capacity calls pass immediately; the next one
    /// waits about 1/R seconds.
    #[tokio::test(start_paused = true)]
    async fn burst_then_spaced() {
        let bucket = TokenBucket::new(2.0, 10.0);
        let start = tokio::time::Instant::now();
        bucket.acquire().await;
        bucket.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        bucket.acquire().await;
        // Third call had to wait ~100 ms for one token at R = 10/s.
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    /// **Scenario**: 30 calls at C = 10, R = 10 finish in about 2 s; calls
    /// beyond the burst are spaced ~100 ms apart.
    #[tokio::test(start_paused = true)]
    async fn thirty_calls_take_about_two_seconds() {
        let bucket = Arc::new(TokenBucket::new(10.0, 10.0));
        let start = tokio::time::Instant::now();
        for _ in 0..30 {
            bucket.acquire().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1900), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(2300), "elapsed {:?}", elapsed);
    }

    /// **Scenario**: Tokens refill up to capacity, never beyond.
    #[tokio::test(start_paused = true)]
    async fn refill_caps_at_capacity() {
        let bucket = TokenBucket::new(5.0, 10.0);
        for _ in 0..5 {
            bucket.acquire().await;
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
        let available = bucket.available().await;
        assert!((available - 5.0).abs() < 1e-6, "available {}", available);
    }

    /// **Scenario**: Concurrent waiters are served first-come first-served
    /// (the lock is held across the sleep).
    #[tokio::test(start_paused = true)]
    async fn waiters_are_fifo() {
        let bucket = Arc::new(TokenBucket::new(1.0, 10.0));
        bucket.acquire().await;

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..3 {
            let bucket = bucket.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                bucket.acquire().await;
                order.lock().unwrap().push(i);
            }));
            // Let each task reach the lock queue before spawning the next.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
