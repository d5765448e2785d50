use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use forkful_common::cancel::CancelToken;

use crate::client::{GenerativeModel, RecipeIntelligenceClient};
use crate::error::IntelligenceError;
use crate::model::{ImageAnalysisResult, Recipe};

/// Bounds for the opt-in retry decorator.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Decorator adding bounded retry with capped exponential backoff.
///
/// Only transport failures are retried. Validation errors, contract
/// violations, and cancellations surface immediately: the same input will
/// produce the same outcome, so a retry only wastes an upstream call.
pub struct RetryingClient<M> {
    inner: RecipeIntelligenceClient<M>,
    policy: RetryPolicy,
}

impl<M: GenerativeModel> RetryingClient<M> {
    pub fn new(inner: RecipeIntelligenceClient<M>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub async fn resolve_recipe(
        &self,
        query: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<Recipe, IntelligenceError> {
        self.run(|| self.inner.resolve_recipe(query, cancel)).await
    }

    pub async fn analyze_image(
        &self,
        image: &[u8],
        mime_type: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<ImageAnalysisResult, IntelligenceError> {
        self.run(|| self.inner.analyze_image(image, mime_type, cancel))
            .await
    }

    async fn run<T, Fut, F>(&self, mut attempt_op: F) -> Result<T, IntelligenceError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, IntelligenceError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match attempt_op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt > self.policy.max_retries || !err.is_retryable() {
                        return Err(err);
                    }
                    let delay = backoff_delay(
                        self.policy.initial_backoff,
                        self.policy.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "upstream request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    let jitter_ms = pseudo_jitter_ms(jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}
