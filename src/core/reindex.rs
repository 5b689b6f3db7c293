use crate::core::poller::Poller;
use crate::core::tasks::wait_for_task;
use crate::domain::model::{NodeInfo, ReindexRequest, ShardRouting, ShardState, TaskProgress};
use crate::domain::ports::ClusterApi;
use crate::utils::error::{LifecycleError, Result};
use crate::utils::validation::validate_non_empty_string;
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ReindexOutcome {
    pub task_id: String,
    pub progress: TaskProgress,
    pub elapsed: Duration,
}

pub struct ReindexJob<C: ClusterApi> {
    cluster: C,
    poller: Poller,
}

impl<C: ClusterApi> ReindexJob<C> {
    pub fn new(cluster: C, poller: Poller) -> Self {
        Self { cluster, poller }
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    pub async fn run(&self, request: &ReindexRequest) -> Result<ReindexOutcome> {
        validate_non_empty_string("source", &request.source)?;
        validate_non_empty_string("dest", &request.dest)?;
        if request.source == request.dest {
            return Err(LifecycleError::InvalidConfigValueError {
                field: "dest".to_string(),
                value: request.dest.clone(),
                reason: "Destination must differ from the source index".to_string(),
            });
        }

        let started = Instant::now();
        tracing::info!("🚀 Reindexing {} -> {}", request.source, request.dest);

        let task_id = self.cluster.start_reindex(request).await?;
        tracing::info!("📋 Reindex running as task {}", task_id);

        let status = wait_for_task(&self.cluster, &self.poller, &task_id).await?;
        let elapsed = started.elapsed();

        tracing::info!(
            "✅ Reindex finished in {:?}: {} created, {} updated, {} version conflicts",
            elapsed,
            status.progress.created,
            status.progress.updated,
            status.progress.version_conflicts
        );

        Ok(ReindexOutcome {
            task_id,
            progress: status.progress,
            elapsed,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShrinkRequest {
    pub source: String,
    pub target: String,
    pub shards: u32,
    pub replicas: u32,
    pub node: Option<String>,
    pub delete_source: bool,
}

impl ShrinkRequest {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            shards: 1,
            replicas: 1,
            node: None,
            delete_source: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShrinkOutcome {
    pub source: String,
    pub target: String,
    pub node: String,
    pub source_shards: u32,
    pub target_shards: u32,
    pub source_deleted: bool,
    pub elapsed: Duration,
}

pub struct ShrinkJob<C: ClusterApi> {
    cluster: C,
    poller: Poller,
}

impl<C: ClusterApi> ShrinkJob<C> {
    pub fn new(cluster: C, poller: Poller) -> Self {
        Self { cluster, poller }
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    pub async fn run(&self, request: &ShrinkRequest) -> Result<ShrinkOutcome> {
        validate_non_empty_string("source", &request.source)?;
        validate_non_empty_string("target", &request.target)?;
        if request.source == request.target {
            return Err(LifecycleError::InvalidConfigValueError {
                field: "target".to_string(),
                value: request.target.clone(),
                reason: "Target must differ from the source index".to_string(),
            });
        }

        let started = Instant::now();
        let source_shards = self.source_shard_count(&request.source).await?;
        check_shard_factor(source_shards, request.shards)?;

        let nodes = self.cluster.nodes().await?;
        let routing = self.cluster.shard_routing(&request.source).await?;
        let node = select_node(request.node.as_deref(), &nodes, &routing)?.clone();

        tracing::info!(
            "🚀 Shrinking {} ({} shards) -> {} ({} shards) on node {}",
            request.source,
            source_shards,
            request.target,
            request.shards,
            node.name
        );

        // 1. 把所有分片集中到同一節點並禁止寫入
        self.cluster
            .update_settings(
                &request.source,
                json!({
                    "index.number_of_replicas": 0,
                    "index.routing.allocation.require._name": node.name,
                    "index.blocks.write": true
                }),
            )
            .await?;

        self.wait_for_relocation(&request.source, &node).await?;
        tracing::info!("📦 All shards of {} are on {}", request.source, node.name);

        // 2. 建立縮減後的索引，並清掉從來源複製過去的限制
        self.cluster
            .shrink_index(
                &request.source,
                &request.target,
                json!({
                    "settings": {
                        "index.number_of_shards": request.shards,
                        "index.number_of_replicas": request.replicas,
                        "index.routing.allocation.require._name": null,
                        "index.blocks.write": null
                    }
                }),
            )
            .await?;

        self.wait_for_started(&request.target).await?;
        tracing::info!("✅ {} is allocated", request.target);

        if request.delete_source {
            self.cluster.delete_index(&request.source).await?;
            tracing::info!("🗑️ Deleted source index {}", request.source);
        }

        Ok(ShrinkOutcome {
            source: request.source.clone(),
            target: request.target.clone(),
            node: node.name,
            source_shards,
            target_shards: request.shards,
            source_deleted: request.delete_source,
            elapsed: started.elapsed(),
        })
    }

    async fn source_shard_count(&self, source: &str) -> Result<u32> {
        let indices = self.cluster.list_indices(Some(source)).await?;
        let info = indices
            .into_iter()
            .find(|i| i.name == source)
            .ok_or_else(|| LifecycleError::ShrinkError {
                message: format!("source index '{}' does not exist", source),
            })?;

        if !info.is_open() {
            return Err(LifecycleError::ShrinkError {
                message: format!("source index '{}' is closed", source),
            });
        }

        info.setting("index.number_of_shards")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                LifecycleError::response(format!(
                    "index.number_of_shards missing from the metadata of '{}'",
                    source
                ))
            })
    }

    async fn wait_for_relocation(&self, index: &str, node: &NodeInfo) -> Result<()> {
        let cluster = &self.cluster;
        let what = format!("shards of {} to move to {}", index, node.name);
        self.poller
            .until(&what, move || async move {
                let routing = cluster.shard_routing(index).await?;
                let settled = routing.iter().filter(|s| s.is_settled_on(&node.id)).count();
                if !routing.is_empty() && settled == routing.len() {
                    return Ok(Some(()));
                }
                tracing::info!("⏳ {}/{} shard copies of {} settled", settled, routing.len(), index);
                Ok(None)
            })
            .await
    }

    async fn wait_for_started(&self, index: &str) -> Result<()> {
        let cluster = &self.cluster;
        let what = format!("shards of {} to start", index);
        self.poller
            .until(&what, move || async move {
                let routing = cluster.shard_routing(index).await?;
                let started = routing
                    .iter()
                    .filter(|s| s.state == ShardState::Started)
                    .count();
                if !routing.is_empty() && started == routing.len() {
                    return Ok(Some(()));
                }
                tracing::info!("⏳ {}/{} shard copies of {} started", started, routing.len(), index);
                Ok(None)
            })
            .await
    }
}

fn check_shard_factor(source_shards: u32, target_shards: u32) -> Result<()> {
    if target_shards == 0 || target_shards >= source_shards {
        return Err(LifecycleError::ShrinkError {
            message: format!(
                "target shard count {} must be between 1 and {} (exclusive)",
                target_shards, source_shards
            ),
        });
    }
    if source_shards % target_shards != 0 {
        return Err(LifecycleError::ShrinkError {
            message: format!(
                "source shard count {} is not a multiple of {}",
                source_shards, target_shards
            ),
        });
    }
    Ok(())
}

/// 指定節點時檢查其存在；否則選擇持有最多主分片的節點
fn select_node<'a>(
    requested: Option<&str>,
    nodes: &'a [NodeInfo],
    routing: &[ShardRouting],
) -> Result<&'a NodeInfo> {
    if let Some(wanted) = requested {
        return nodes
            .iter()
            .find(|n| n.name == wanted || n.id == wanted)
            .ok_or_else(|| LifecycleError::ShrinkError {
                message: format!("node '{}' is not part of the cluster", wanted),
            });
    }

    let mut primaries: HashMap<&str, usize> = HashMap::new();
    for shard in routing.iter().filter(|s| s.primary) {
        if let Some(node) = shard.node.as_deref() {
            *primaries.entry(node).or_default() += 1;
        }
    }

    nodes
        .iter()
        .filter_map(|n| primaries.get(n.id.as_str()).map(|count| (n, *count)))
        .max_by(|(a, a_count), (b, b_count)| a_count.cmp(b_count).then_with(|| b.name.cmp(&a.name)))
        .map(|(node, _)| node)
        .ok_or_else(|| LifecycleError::ShrinkError {
            message: "no node holds a primary shard of the source index".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollSettings;
    use crate::core::test_support::{shard, task, FakeCluster};
    use crate::domain::model::{IndexInfo, IndexState};
    use serde_json::json;

    fn fast_poller() -> Poller {
        Poller::new(PollSettings {
            interval: Duration::from_millis(1),
            max_wait: Some(Duration::from_secs(5)),
            max_consecutive_errors: 1,
        })
    }

    fn node(id: &str, name: &str) -> NodeInfo {
        NodeInfo {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reindex_waits_for_task() {
        let mut cluster = FakeCluster::new().with_task(
            "n1:5",
            vec![task("n1:5", false, 10, 4), task("n1:5", true, 10, 10)],
        );
        cluster.reindex_task = Some("n1:5".to_string());
        let job = ReindexJob::new(cluster, fast_poller());

        let outcome = job.run(&ReindexRequest::new("old", "new")).await.unwrap();

        assert_eq!(outcome.task_id, "n1:5");
        assert_eq!(outcome.progress.created, 10);
        assert_eq!(
            job.cluster().calls(),
            vec!["REINDEX old new", "TASK n1:5", "TASK n1:5"]
        );
    }

    #[tokio::test]
    async fn test_reindex_rejects_same_index() {
        let job = ReindexJob::new(FakeCluster::new(), fast_poller());
        let err = job.run(&ReindexRequest::new("logs", "logs")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidConfigValueError { .. }));
        assert!(job.cluster().calls().is_empty());
    }

    #[tokio::test]
    async fn test_reindex_surfaces_failures() {
        let mut done = task("n1:9", true, 2, 1);
        done.failures = vec![json!({"cause": {"type": "mapper_parsing_exception", "reason": "bad"}})];
        let mut cluster = FakeCluster::new().with_task("n1:9", vec![done]);
        cluster.reindex_task = Some("n1:9".to_string());

        let err = ReindexJob::new(cluster, fast_poller())
            .run(&ReindexRequest::new("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::TaskFailed { .. }));
    }

    #[test]
    fn test_shard_factor() {
        assert!(check_shard_factor(6, 3).is_ok());
        assert!(check_shard_factor(6, 1).is_ok());
        assert!(check_shard_factor(6, 4).is_err());
        assert!(check_shard_factor(6, 6).is_err());
        assert!(check_shard_factor(1, 1).is_err());
    }

    #[test]
    fn test_select_node_by_primaries() {
        let nodes = vec![node("a1", "es-a"), node("b1", "es-b"), node("c1", "es-c")];
        let routing = vec![
            shard("logs", 0, true, ShardState::Started, "b1"),
            shard("logs", 1, true, ShardState::Started, "b1"),
            shard("logs", 2, true, ShardState::Started, "a1"),
            shard("logs", 0, false, ShardState::Started, "c1"),
            shard("logs", 1, false, ShardState::Started, "c1"),
            shard("logs", 2, false, ShardState::Started, "c1"),
        ];

        assert_eq!(select_node(None, &nodes, &routing).unwrap().name, "es-b");
        assert_eq!(select_node(Some("es-c"), &nodes, &routing).unwrap().id, "c1");
        assert!(select_node(Some("es-z"), &nodes, &routing).is_err());
    }

    #[test]
    fn test_select_node_tie_prefers_smallest_name() {
        let nodes = vec![node("b1", "es-b"), node("a1", "es-a")];
        let routing = vec![
            shard("logs", 0, true, ShardState::Started, "b1"),
            shard("logs", 1, true, ShardState::Started, "a1"),
        ];
        assert_eq!(select_node(None, &nodes, &routing).unwrap().name, "es-a");
    }

    #[tokio::test]
    async fn test_shrink_flow() {
        let source = "logs-2024.01";
        let target = "logs-2024.01-shrunk";
        let cluster = FakeCluster::new()
            .with_index(IndexInfo::new(
                source,
                IndexState::Open,
                json!({"index": {"number_of_shards": "4"}}),
            ))
            .with_node("a1", "es-a")
            .with_node("b1", "es-b")
            .with_routing(
                source,
                vec![
                    // selection
                    vec![
                        shard(source, 0, true, ShardState::Started, "a1"),
                        shard(source, 1, true, ShardState::Started, "b1"),
                        shard(source, 2, true, ShardState::Started, "b1"),
                        shard(source, 3, true, ShardState::Started, "a1"),
                    ],
                    // relocation in progress
                    vec![
                        shard(source, 0, true, ShardState::Relocating, "a1"),
                        shard(source, 1, true, ShardState::Started, "b1"),
                        shard(source, 2, true, ShardState::Started, "b1"),
                        shard(source, 3, true, ShardState::Started, "a1"),
                    ],
                    // done
                    vec![
                        shard(source, 0, true, ShardState::Started, "a1"),
                        shard(source, 1, true, ShardState::Started, "a1"),
                        shard(source, 2, true, ShardState::Started, "a1"),
                        shard(source, 3, true, ShardState::Started, "a1"),
                    ],
                ],
            )
            .with_routing(
                target,
                vec![
                    vec![shard(target, 0, true, ShardState::Initializing, "a1")],
                    vec![shard(target, 0, true, ShardState::Started, "a1")],
                ],
            );

        let job = ShrinkJob::new(cluster, fast_poller());
        let mut request = ShrinkRequest::new(source, target);
        request.shards = 2;
        request.delete_source = true;

        let outcome = job.run(&request).await.unwrap();

        assert_eq!(outcome.node, "es-a");
        assert_eq!(outcome.source_shards, 4);
        assert!(outcome.source_deleted);
        assert_eq!(
            job.cluster().calls(),
            vec![
                format!("SETTINGS {}", source),
                format!("SHRINK {} {}", source, target),
                format!("DELETE {}", source),
            ]
        );

        let bodies = job.cluster().bodies();
        assert_eq!(bodies[0]["index.routing.allocation.require._name"], "es-a");
        assert_eq!(bodies[0]["index.blocks.write"], true);
        assert_eq!(bodies[1]["settings"]["index.number_of_shards"], 2);
        assert!(bodies[1]["settings"]["index.blocks.write"].is_null());
    }

    #[tokio::test]
    async fn test_shrink_rejects_bad_factor_before_touching_the_index() {
        let cluster = FakeCluster::new().with_index(IndexInfo::new(
            "logs",
            IndexState::Open,
            json!({"index": {"number_of_shards": "5"}}),
        ));
        let job = ShrinkJob::new(cluster, fast_poller());
        let mut request = ShrinkRequest::new("logs", "logs-small");
        request.shards = 2;

        let err = job.run(&request).await.unwrap_err();
        assert!(matches!(err, LifecycleError::ShrinkError { .. }));
        assert!(job.cluster().calls().is_empty());
    }

    #[tokio::test]
    async fn test_shrink_rejects_empty_names() {
        let job = ShrinkJob::new(FakeCluster::new(), fast_poller());

        let err = job.run(&ShrinkRequest::new("", "logs-small")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidConfigValueError { ref field, .. } if field == "source"));

        let err = job.run(&ShrinkRequest::new("logs", "  ")).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidConfigValueError { ref field, .. } if field == "target"));

        assert!(job.cluster().calls().is_empty());
    }

    #[tokio::test]
    async fn test_shrink_missing_source() {
        let job = ShrinkJob::new(FakeCluster::new(), fast_poller());
        let err = job
            .run(&ShrinkRequest::new("missing", "missing-small"))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ShrinkError { .. }));
    }
}
