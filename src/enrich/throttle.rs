//! Burst throttle: R requests go out immediately, the next one waits a cool-down,
//! every later one waits a fixed steady interval.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub burst: usize,
    pub cooldown_secs: u64,
    pub steady_interval_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            burst: 15,
            cooldown_secs: 60,
            steady_interval_ms: 1_000,
        }
    }
}

#[derive(Debug)]
pub struct BurstThrottle {
    burst: usize,
    cooldown: Duration,
    steady: Duration,
    issued: usize,
}

impl BurstThrottle {
    pub fn new(cfg: &ThrottleConfig) -> Self {
        Self {
            burst: cfg.burst,
            cooldown: Duration::from_secs(cfg.cooldown_secs),
            steady: Duration::from_millis(cfg.steady_interval_ms),
            issued: 0,
        }
    }

    /// Delay owed before request number `n` (1-based).
    pub fn delay_for(&self, n: usize) -> Duration {
        if n <= self.burst {
            Duration::ZERO
        } else if n == self.burst + 1 {
            self.cooldown
        } else {
            self.steady
        }
    }

    /// Wait until the next request may be sent.
    pub async fn acquire(&mut self) {
        self.issued += 1;
        let wait = self.delay_for(self.issued);
        if !wait.is_zero() {
            tracing::debug!(target: "enrich", request = self.issued, wait_ms = wait.as_millis() as u64, "throttling");
            tokio::time::sleep(wait).await;
        }
    }

    pub fn issued(&self) -> usize {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_then_cooldown_then_steady() {
        let mut t = BurstThrottle::new(&ThrottleConfig {
            burst: 2,
            cooldown_secs: 60,
            steady_interval_ms: 1_000,
        });
        let start = tokio::time::Instant::now();
        t.acquire().await;
        t.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        t.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        t.acquire().await;
        t.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(62));
        assert_eq!(t.issued(), 5);
    }
}
