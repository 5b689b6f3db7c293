pub mod age;
pub mod condition;
pub mod curator;
pub mod poller;
pub mod reindex;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::model::{IndexInfo, LifecycleAction, ReindexRequest, TaskStatus};
pub use crate::domain::ports::ClusterApi;
pub use crate::utils::error::Result;
