use crate::domain::model::{IndexInfo, NodeInfo, ReindexRequest, ShardRouting, TaskStatus};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// 與 Elasticsearch 叢集溝通的介面
///
/// `core` 裡的工作只透過這個 trait 存取叢集，可接 HTTP client，測試時接記憶體中的假叢集
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Starts `_reindex` without waiting and returns the task id.
    async fn start_reindex(&self, request: &ReindexRequest) -> Result<String>;

    async fn get_task(&self, task_id: &str) -> Result<TaskStatus>;

    /// Index metadata from `_cluster/state/metadata`, sorted by name.
    async fn list_indices(&self, pattern: Option<&str>) -> Result<Vec<IndexInfo>>;

    async fn shard_routing(&self, index: &str) -> Result<Vec<ShardRouting>>;

    async fn nodes(&self) -> Result<Vec<NodeInfo>>;

    async fn update_settings(&self, index: &str, settings: Value) -> Result<()>;

    async fn shrink_index(&self, source: &str, target: &str, body: Value) -> Result<()>;

    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Returns the task id when the cluster runs the merge in the background.
    async fn force_merge(
        &self,
        index: &str,
        max_num_segments: Option<u32>,
        only_expunge_deletes: bool,
    ) -> Result<Option<String>>;
}
