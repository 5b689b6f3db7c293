use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{method} {url} returned {status}: {body}")]
    ApiError {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Policy error: {message}")]
    PolicyError { message: String },

    #[error("Cannot parse date '{value}' in index '{index}': {reason}")]
    DateParseError {
        index: String,
        value: String,
        reason: String,
    },

    #[error("Unexpected response from cluster: {message}")]
    ResponseError { message: String },

    #[error("Task {task_id} failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("Shrink precondition failed: {message}")]
    ShrinkError { message: String },

    #[error("{failed} of {total} lifecycle actions failed")]
    ActionsFailed { failed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Api,
    Configuration,
    Data,
    Operation,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LifecycleError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn policy(message: impl Into<String>) -> Self {
        Self::PolicyError {
            message: message.into(),
        }
    }

    pub fn response(message: impl Into<String>) -> Self {
        Self::ResponseError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) => ErrorCategory::Network,
            Self::ApiError { .. } | Self::ResponseError { .. } => ErrorCategory::Api,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::PolicyError { .. } => ErrorCategory::Configuration,
            Self::SerializationError(_) | Self::DateParseError { .. } => ErrorCategory::Data,
            Self::TaskFailed { .. }
            | Self::Timeout { .. }
            | Self::ShrinkError { .. }
            | Self::ActionsFailed { .. } => ErrorCategory::Operation,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DateParseError { .. } => ErrorSeverity::Low,
            Self::HttpError(_) | Self::Timeout { .. } => ErrorSeverity::Medium,
            Self::ApiError { status, .. } if *status == 429 || *status >= 500 => {
                ErrorSeverity::Medium
            }
            Self::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 暫時性錯誤 (網路中斷、5xx、429) 可以在輪詢時重試
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::HttpError(_) => "Check that the cluster URL is reachable and the node is up",
            Self::ApiError { status: 401, .. } | Self::ApiError { status: 403, .. } => {
                "Check the --user/--password or --api-key credentials and their privileges"
            }
            Self::ApiError { status: 404, .. } => "Check that the index or task name is correct",
            Self::ApiError { status, .. } if *status == 429 || *status >= 500 => {
                "The cluster is overloaded or unhealthy; retry later"
            }
            Self::ApiError { .. } | Self::ResponseError { .. } => {
                "Inspect the response body above for the cluster's reason"
            }
            Self::IoError(_) => "Check file paths and permissions",
            Self::SerializationError(_) => "Check that the JSON is well formed",
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Review the command line flags and try again",
            Self::PolicyError { .. } => "Fix the policy file and validate it with --dry-run",
            Self::DateParseError { .. } => {
                "Adjust date_pattern/date_format so they match the index names"
            }
            Self::TaskFailed { .. } => "Inspect the task failures and the destination mapping",
            Self::Timeout { .. } => "Increase --max-wait or check the cluster for stuck tasks",
            Self::ShrinkError { .. } => {
                "Choose a target shard count that divides the source shard count"
            }
            Self::ActionsFailed { .. } => "Check the log for each failed action",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::HttpError(_) => "Could not reach the Elasticsearch cluster".to_string(),
            Self::ApiError { status, body, .. } => {
                format!("Elasticsearch rejected the request ({}): {}", status, body)
            }
            Self::Timeout { what, .. } => format!("Gave up waiting for {}", what),
            other => other.to_string(),
        }
    }

    /// 依嚴重程度對應程式結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}
