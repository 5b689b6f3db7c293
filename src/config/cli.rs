use crate::config::{
    ConnectionSettings, Credentials, PollSettings, DEFAULT_MAX_POLL_ERRORS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_URL,
};
use crate::core::curator::CuratorOptions;
use crate::core::reindex::ShrinkRequest;
use crate::domain::model::ReindexRequest;
use crate::utils::error::{LifecycleError, Result};
use crate::utils::validation::{validate_index_name, validate_positive_number, Validate};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Elasticsearch base URL
    #[arg(long, env = "ES_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Basic auth user
    #[arg(long, env = "ES_USER")]
    pub user: Option<String>,

    /// Basic auth password
    #[arg(long, env = "ES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Encoded API key, sent as `Authorization: ApiKey <key>`
    #[arg(long, env = "ES_API_KEY", hide_env_values = true, conflicts_with = "user")]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,
}

impl ConnectionArgs {
    pub fn to_settings(&self) -> Result<ConnectionSettings> {
        validate_positive_number("timeout_secs", self.timeout_secs, 1)?;

        let credentials = match (&self.api_key, &self.user, &self.password) {
            (Some(key), _, _) => Some(Credentials::ApiKey(key.clone())),
            (None, Some(user), password) => Some(Credentials::Basic {
                user: user.clone(),
                password: password.clone(),
            }),
            (None, None, Some(_)) => {
                return Err(LifecycleError::MissingConfigError {
                    field: "user (a password was given without --user)".to_string(),
                })
            }
            (None, None, None) => None,
        };

        let settings = ConnectionSettings {
            url: self.url.clone(),
            credentials,
            timeout: Duration::from_secs(self.timeout_secs),
            accept_invalid_certs: self.insecure,
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Args)]
pub struct PollArgs {
    /// Seconds to sleep between status checks
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval: u64,

    /// Give up after this many seconds (default: wait forever)
    #[arg(long)]
    pub max_wait: Option<u64>,

    /// Consecutive transient errors tolerated while polling
    #[arg(long, default_value_t = DEFAULT_MAX_POLL_ERRORS)]
    pub max_poll_errors: u32,
}

impl PollArgs {
    pub fn to_settings(&self) -> Result<PollSettings> {
        validate_positive_number("poll_interval", self.poll_interval, 1)?;
        let settings = PollSettings {
            interval: Duration::from_secs(self.poll_interval),
            max_wait: self.max_wait.map(Duration::from_secs),
            max_consecutive_errors: self.max_poll_errors,
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Parser)]
#[command(name = "es-reindex")]
#[command(about = "Run an Elasticsearch reindex or shrink and wait for it to finish")]
pub struct ReindexCli {
    #[command(subcommand)]
    pub command: ReindexCommand,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub poll: PollArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ReindexCommand {
    /// Copy documents from one index into another
    Reindex(ReindexArgs),
    /// Shrink an index into a new index with fewer primary shards
    Shrink(ShrinkArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ReindexArgs {
    #[arg(long)]
    pub source: String,

    #[arg(long)]
    pub dest: String,

    /// Scroll batch size
    #[arg(long)]
    pub size: Option<u32>,

    /// Number of slices, or `auto`
    #[arg(long)]
    pub slices: Option<String>,

    /// Throttle, in sub-requests per second
    #[arg(long)]
    pub requests_per_second: Option<f64>,

    /// Count version conflicts instead of aborting
    #[arg(long)]
    pub proceed_on_conflicts: bool,

    /// Only create missing documents (`op_type: create`)
    #[arg(long)]
    pub create_only: bool,

    /// Source query as JSON, e.g. '{"range":{"@timestamp":{"gte":"now-1d"}}}'
    #[arg(long)]
    pub query: Option<String>,
}

impl ReindexArgs {
    pub fn to_request(&self) -> Result<ReindexRequest> {
        let query = self
            .query
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()
            .map_err(|e| LifecycleError::InvalidConfigValueError {
                field: "query".to_string(),
                value: self.query.clone().unwrap_or_default(),
                reason: format!("Query is not valid JSON: {}", e),
            })?;

        if let Some(slices) = &self.slices {
            if slices != "auto" && !slices.parse::<u32>().is_ok_and(|n| n > 0) {
                return Err(LifecycleError::InvalidConfigValueError {
                    field: "slices".to_string(),
                    value: slices.clone(),
                    reason: "Must be 'auto' or a positive number".to_string(),
                });
            }
        }

        let mut request = ReindexRequest::new(&self.source, &self.dest);
        request.batch_size = self.size;
        request.slices = self.slices.clone();
        request.requests_per_second = self.requests_per_second;
        request.proceed_on_conflicts = self.proceed_on_conflicts;
        request.create_only = self.create_only;
        request.query = query;
        Ok(request)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ShrinkArgs {
    #[arg(long)]
    pub source: String,

    #[arg(long)]
    pub target: String,

    /// Primary shard count of the target index
    #[arg(long, default_value_t = 1)]
    pub shards: u32,

    /// Replica count of the target index
    #[arg(long, default_value_t = 1)]
    pub replicas: u32,

    /// Node to gather the shards on (default: node holding most primaries)
    #[arg(long)]
    pub node: Option<String>,

    /// Delete the source index once the target is green
    #[arg(long)]
    pub delete_source: bool,
}

impl ShrinkArgs {
    pub fn to_request(&self) -> Result<ShrinkRequest> {
        validate_index_name("source", &self.source)?;
        validate_index_name("target", &self.target)?;
        validate_positive_number("shards", u64::from(self.shards), 1)?;
        Ok(ShrinkRequest {
            source: self.source.clone(),
            target: self.target.clone(),
            shards: self.shards,
            replicas: self.replicas,
            node: self.node.clone(),
            delete_source: self.delete_source,
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "es-curator")]
#[command(about = "Delete, force-merge or reroute indices by the age in their name")]
pub struct CuratorCli {
    /// Path to the JSON policy file
    #[arg(short, long, default_value = "policy.json")]
    pub policy: PathBuf,

    /// Only print what would be done
    #[arg(long)]
    pub dry_run: bool,

    /// Only evaluate the rule with this name
    #[arg(long)]
    pub rule: Option<String>,

    /// Keep going after a failed action and report all failures at the end
    #[arg(long)]
    pub continue_on_error: bool,

    /// Evaluate ages as of this date (YYYY-MM-DD) instead of today (UTC)
    #[arg(long)]
    pub today: Option<NaiveDate>,

    /// Index expression passed to the cluster state request
    #[arg(long)]
    pub pattern: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub poll: PollArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

impl CuratorCli {
    pub fn options(&self) -> CuratorOptions {
        CuratorOptions {
            dry_run: self.dry_run,
            continue_on_error: self.continue_on_error,
            rule_filter: self.rule.clone(),
            index_pattern: self.pattern.clone(),
        }
    }

    pub fn evaluation_date(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}
