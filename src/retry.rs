use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetrySettings;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub default_backoff: Duration,
    pub max_wait: Duration,
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        RetryPolicy {
            max_retries: s.max_retries,
            default_backoff: Duration::from_secs(s.default_backoff_secs),
            max_wait: Duration::from_secs(s.max_wait_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetrySettings::default())
    }
}

impl RetryPolicy {
    /// Server-provided delay when there is one, the default otherwise,
    /// never longer than `max_wait`.
    pub fn backoff_for(&self, retry_after_secs: u64) -> Duration {
        let requested = if retry_after_secs > 0 {
            Duration::from_secs(retry_after_secs)
        } else {
            self.default_backoff
        };
        requested.min(self.max_wait)
    }
}

/// Run `op`, retrying only on [`Error::RateLimit`] up to `max_retries` times.
/// Any other error, or a rate limit past the cap, is returned as is.
pub async fn with_rate_limit_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Err(Error::RateLimit {
                retry_after_secs, ..
            }) if attempt < policy.max_retries => {
                let backoff = policy.backoff_for(retry_after_secs);
                attempt += 1;
                warn!(
                    "Rate limited on {} (attempt {}/{}), backing off {:.1}s",
                    label,
                    attempt,
                    policy.max_retries,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
            other => return other,
        }
    }
}

/// Secondary lookups degrade to an empty result instead of failing the caller.
pub async fn or_empty<T, Fut>(label: &str, fut: Fut) -> T
where
    T: Default,
    Fut: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(v) => v,
        Err(e) => {
            warn!("{} failed, continuing without it: {}", label, e);
            T::default()
        }
    }
}
