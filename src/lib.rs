pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::http::EsClient;
pub use crate::config::policy::Policy;
pub use crate::config::{ConnectionSettings, Credentials, PollSettings};
pub use crate::core::{
    curator::{Curator, CuratorOptions, RunSummary},
    poller::Poller,
    reindex::{ReindexJob, ShrinkJob, ShrinkRequest},
};
pub use crate::domain::ports::ClusterApi;
pub use crate::utils::error::{LifecycleError, Result};
