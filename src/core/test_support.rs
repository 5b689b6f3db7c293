//! In-memory `ClusterApi` used by the unit tests of the jobs. Responses for
//! tasks and routing tables are queued; the last one repeats.

use crate::domain::model::{
    IndexInfo, NodeInfo, ReindexRequest, ShardRouting, ShardState, TaskProgress, TaskStatus,
};
use crate::domain::ports::ClusterApi;
use crate::utils::error::{LifecycleError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeCluster {
    pub indices: Vec<IndexInfo>,
    pub nodes: Vec<NodeInfo>,
    pub reindex_task: Option<String>,
    pub forcemerge_task: Option<String>,
    tasks: Mutex<HashMap<String, VecDeque<TaskStatus>>>,
    routing: Mutex<HashMap<String, VecDeque<Vec<ShardRouting>>>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
    bodies: Mutex<Vec<Value>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: IndexInfo) -> Self {
        self.indices.push(index);
        self
    }

    pub fn with_node(mut self, id: &str, name: &str) -> Self {
        self.nodes.push(NodeInfo {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_task(self, task_id: &str, statuses: Vec<TaskStatus>) -> Self {
        self.tasks
            .lock()
            .unwrap()
            .insert(task_id.to_string(), statuses.into());
        self
    }

    pub fn with_routing(self, index: &str, tables: Vec<Vec<ShardRouting>>) -> Self {
        self.routing
            .lock()
            .unwrap()
            .insert(index.to_string(), tables.into());
        self
    }

    /// Mutating calls against this index return a 500.
    pub fn failing_on(mut self, index: &str) -> Self {
        self.failing.insert(index.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }

    fn record(&self, call: String, index: &str) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        if self.failing.contains(index) {
            return Err(LifecycleError::ApiError {
                method: "FAKE".to_string(),
                url: call,
                status: 500,
                body: "{\"error\":\"boom\"}".to_string(),
            });
        }
        Ok(())
    }
}

fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

pub fn task(task_id: &str, completed: bool, total: u64, created: u64) -> TaskStatus {
    TaskStatus {
        task_id: task_id.to_string(),
        completed,
        description: None,
        progress: TaskProgress {
            total,
            created,
            ..TaskProgress::default()
        },
        failures: Vec::new(),
        error: None,
    }
}

pub fn shard(index: &str, shard: u32, primary: bool, state: ShardState, node: &str) -> ShardRouting {
    ShardRouting {
        index: index.to_string(),
        shard,
        primary,
        state,
        node: Some(node.to_string()),
        relocating_node: None,
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn start_reindex(&self, request: &ReindexRequest) -> Result<String> {
        self.record(format!("REINDEX {} {}", request.source, request.dest), &request.dest)?;
        self.bodies.lock().unwrap().push(request.body());
        self.reindex_task
            .clone()
            .ok_or_else(|| LifecycleError::response("no task"))
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskStatus> {
        self.calls.lock().unwrap().push(format!("TASK {}", task_id));
        let mut tasks = self.tasks.lock().unwrap();
        tasks
            .get_mut(task_id)
            .and_then(|queue| next(queue))
            .ok_or_else(|| LifecycleError::ApiError {
                method: "GET".to_string(),
                url: format!("/_tasks/{}", task_id),
                status: 404,
                body: String::new(),
            })
    }

    async fn list_indices(&self, pattern: Option<&str>) -> Result<Vec<IndexInfo>> {
        let indices = match pattern {
            Some(pattern) => self
                .indices
                .iter()
                .filter(|i| i.name == pattern)
                .cloned()
                .collect(),
            None => self.indices.clone(),
        };
        Ok(indices)
    }

    async fn shard_routing(&self, index: &str) -> Result<Vec<ShardRouting>> {
        let mut routing = self.routing.lock().unwrap();
        Ok(routing.get_mut(index).and_then(|queue| next(queue)).unwrap_or_default())
    }

    async fn nodes(&self) -> Result<Vec<NodeInfo>> {
        Ok(self.nodes.clone())
    }

    async fn update_settings(&self, index: &str, settings: Value) -> Result<()> {
        self.record(format!("SETTINGS {}", index), index)?;
        self.bodies.lock().unwrap().push(settings);
        Ok(())
    }

    async fn shrink_index(&self, source: &str, target: &str, body: Value) -> Result<()> {
        self.record(format!("SHRINK {} {}", source, target), source)?;
        self.bodies.lock().unwrap().push(body);
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.record(format!("DELETE {}", index), index)
    }

    async fn force_merge(
        &self,
        index: &str,
        max_num_segments: Option<u32>,
        _only_expunge_deletes: bool,
    ) -> Result<Option<String>> {
        let call = match max_num_segments {
            Some(n) => format!("FORCEMERGE {} {}", index, n),
            None => format!("FORCEMERGE {}", index),
        };
        self.record(call, index)?;
        Ok(self.forcemerge_task.clone())
    }
}
