use crate::config::PollSettings;
use crate::utils::error::{LifecycleError, Result};
use std::future::Future;
use tokio::time::{sleep, Instant};

/// 以固定間隔輪詢，直到條件成立
#[derive(Debug, Clone)]
pub struct Poller {
    settings: PollSettings,
}

impl Poller {
    pub fn new(settings: PollSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Calls `check` until it yields `Some`. Transient errors are retried up
    /// to `max_consecutive_errors` times in a row; anything else is returned
    /// immediately.
    pub async fn until<T, F, Fut>(&self, what: &str, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let started = Instant::now();
        let mut consecutive_errors = 0u32;
        let mut attempt = 0u64;

        loop {
            attempt += 1;
            match check().await {
                Ok(Some(value)) => {
                    tracing::debug!("{} done after {} check(s)", what, attempt);
                    return Ok(value);
                }
                Ok(None) => consecutive_errors = 0,
                Err(e) if e.is_retryable() => {
                    consecutive_errors += 1;
                    if consecutive_errors > self.settings.max_consecutive_errors {
                        return Err(e);
                    }
                    tracing::warn!(
                        "⚠️ Transient error while waiting for {} ({}/{}): {}",
                        what,
                        consecutive_errors,
                        self.settings.max_consecutive_errors,
                        e
                    );
                }
                Err(e) => return Err(e),
            }

            if let Some(max_wait) = self.settings.max_wait {
                let waited = started.elapsed();
                if waited + self.settings.interval > max_wait {
                    return Err(LifecycleError::Timeout {
                        what: what.to_string(),
                        waited,
                    });
                }
            }

            sleep(self.settings.interval).await;
        }
    }
}
