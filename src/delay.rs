use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Politeness pause between sequential requests.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, hint: Duration);
}

/// Sleeps exactly the hinted duration.
pub struct FixedDelay;

#[async_trait]
impl Delay for FixedDelay {
    async fn wait(&self, hint: Duration) {
        if !hint.is_zero() {
            tokio::time::sleep(hint).await;
        }
    }
}

/// Sleeps the hint plus a random extra in `0..=max_jitter`.
pub struct JitterDelay {
    max_jitter: Duration,
}

impl JitterDelay {
    pub fn new(max_jitter: Duration) -> Self {
        Self { max_jitter }
    }

    fn pick(&self, hint: Duration) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return hint;
        }
        hint + Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

#[async_trait]
impl Delay for JitterDelay {
    async fn wait(&self, hint: Duration) {
        let total = self.pick(hint);
        if !total.is_zero() {
            tokio::time::sleep(total).await;
        }
    }
}

/// Never sleeps.
#[cfg(test)]
pub struct ZeroDelay;

#[cfg(test)]
#[async_trait]
impl Delay for ZeroDelay {
    async fn wait(&self, _hint: Duration) {}
}
