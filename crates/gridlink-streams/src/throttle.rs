//! Token-bucket throttle on aggregate record emission.

use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

pub struct Throttle {
    limiter: DefaultDirectRateLimiter,
    burst: u32,
}

impl Throttle {
    /// Cap the aggregate delivery rate at `records_per_second`.
    pub fn new(records_per_second: u32) -> Self {
        let rate = NonZeroU32::new(records_per_second).unwrap_or(NonZeroU32::MIN);
        Throttle {
            limiter: RateLimiter::direct(Quota::per_second(rate).allow_burst(rate)),
            burst: rate.get(),
        }
    }

    /// Wait until `records` tokens are available. Larger batches are
    /// acquired in bucket-sized slices.
    pub async fn acquire(&self, records: usize) {
        let mut remaining = records as u64;
        while remaining > 0 {
            let slice = remaining.min(u64::from(self.burst)) as u32;
            let Some(slice) = NonZeroU32::new(slice) else {
                break;
            };
            // The slice never exceeds the bucket, so this cannot fail
            // with insufficient capacity.
            if self.limiter.until_n_ready(slice).await.is_err() {
                break;
            }
            remaining -= u64::from(slice.get());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn burst_within_rate_is_not_delayed() {
        let throttle = Throttle::new(1000);
        let start = Instant::now();
        throttle.acquire(100).await;
        assert!(start.elapsed().as_millis() < 100);
    }

    #[tokio::test]
    async fn sustained_excess_is_slowed_down() {
        let throttle = Throttle::new(100);
        let start = Instant::now();
        // Twice the bucket: the second slice must wait for refill.
        throttle.acquire(200).await;
        assert!(start.elapsed().as_millis() >= 900);
    }
}
