#[cfg(feature = "cli")]
pub mod cli;
pub mod policy;

use crate::utils::error::{LifecycleError, Result};
use crate::utils::validation::{validate_positive_number, validate_url, Validate};
use std::time::Duration;

pub const DEFAULT_URL: &str = "http://localhost:9200";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_MAX_POLL_ERRORS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic {
        user: String,
        password: Option<String>,
    },
    ApiKey(String),
}

/// 叢集連線設定
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: String,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl ConnectionSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            accept_invalid_certs: false,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl Validate for ConnectionSettings {
    fn validate(&self) -> Result<()> {
        validate_url("url", &self.url)?;
        if self.timeout.is_zero() {
            return Err(LifecycleError::InvalidConfigValueError {
                field: "timeout".to_string(),
                value: "0".to_string(),
                reason: "Request timeout must be greater than zero".to_string(),
            });
        }
        if let Some(Credentials::Basic { user, .. }) = &self.credentials {
            if user.trim().is_empty() {
                return Err(LifecycleError::MissingConfigError {
                    field: "user".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// 輪詢設定 (長時間任務、分片搬移)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
    pub max_consecutive_errors: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_wait: None,
            max_consecutive_errors: DEFAULT_MAX_POLL_ERRORS,
        }
    }
}

impl Validate for PollSettings {
    fn validate(&self) -> Result<()> {
        if let Some(max_wait) = self.max_wait {
            validate_positive_number("max_wait", max_wait.as_secs(), 1)?;
            if max_wait < self.interval {
                return Err(LifecycleError::InvalidConfigValueError {
                    field: "max_wait".to_string(),
                    value: format!("{:?}", max_wait),
                    reason: "Must not be shorter than the poll interval".to_string(),
                });
            }
        }
        Ok(())
    }
}
