use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 叢集狀態 metadata 中的一個索引
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub state: IndexState,
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    Open,
    Close,
}

impl IndexInfo {
    pub fn new(name: impl Into<String>, state: IndexState, settings: Value) -> Self {
        Self {
            name: name.into(),
            state,
            settings,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == IndexState::Open
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    /// 讀取設定值，例如 `index.number_of_shards`
    ///
    /// cluster state 回傳巢狀物件，`flat_settings` 回傳點分隔的鍵，兩種都接受
    pub fn setting(&self, key: &str) -> Option<String> {
        lookup_setting(&self.settings, key)
    }
}

fn lookup_setting(settings: &Value, key: &str) -> Option<String> {
    let obj = settings.as_object()?;
    if let Some(value) = obj.get(key) {
        return scalar_to_string(value);
    }
    // 逐段展開巢狀結構，允許部分鍵是扁平的 (例如 "index": {"routing.allocation...": ..})
    let mut prefix = String::new();
    for part in key.split('.') {
        if !prefix.is_empty() {
            prefix.push('.');
        }
        prefix.push_str(part);
        if let Some(child) = obj.get(&prefix) {
            let rest = &key[prefix.len()..];
            if rest.is_empty() {
                return scalar_to_string(child);
            }
            if let Some(found) = lookup_setting(child, &rest[1..]) {
                return Some(found);
            }
        }
    }
    None
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShardRouting {
    pub index: String,
    pub shard: u32,
    pub primary: bool,
    pub state: ShardState,
    pub node: Option<String>,
    #[serde(default)]
    pub relocating_node: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardState {
    Unassigned,
    Initializing,
    Started,
    Relocating,
}

impl ShardRouting {
    pub fn is_settled_on(&self, node_id: &str) -> bool {
        self.state == ShardState::Started
            && self.node.as_deref() == Some(node_id)
            && self.relocating_node.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: String,
    pub name: String,
}

/// `_tasks/{id}` 回應中的進度欄位
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TaskProgress {
    pub total: u64,
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub batches: u64,
    pub version_conflicts: u64,
}

impl TaskProgress {
    pub fn processed(&self) -> u64 {
        self.created + self.updated + self.deleted
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.processed() as f64 / self.total as f64) * 100.0
        }
    }
}

impl fmt::Display for TaskProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.1}%), batches: {}, conflicts: {}",
            self.processed(),
            self.total,
            self.percent(),
            self.batches,
            self.version_conflicts
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatus {
    pub task_id: String,
    pub completed: bool,
    pub description: Option<String>,
    pub progress: TaskProgress,
    pub failures: Vec<Value>,
    pub error: Option<Value>,
}

#[derive(Deserialize)]
struct TaskEnvelope {
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    task: TaskBody,
    #[serde(default)]
    response: Option<TaskResponse>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Default, Deserialize)]
struct TaskBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<TaskProgress>,
}

#[derive(Deserialize)]
struct TaskResponse {
    #[serde(default)]
    failures: Vec<Value>,
    #[serde(flatten)]
    counts: TaskProgress,
}

impl TaskStatus {
    pub fn from_response(task_id: &str, body: Value) -> serde_json::Result<Self> {
        let envelope: TaskEnvelope = serde_json::from_value(body)?;
        let (progress, failures) = match envelope.response {
            // 完成後 response 內的統計才是最終值
            Some(response) => (response.counts, response.failures),
            None => (envelope.task.status.unwrap_or_default(), Vec::new()),
        };
        Ok(Self {
            task_id: task_id.to_string(),
            completed: envelope.completed,
            description: envelope.task.description,
            progress,
            failures,
            error: envelope.error,
        })
    }

    /// 失敗原因的簡短描述；None 表示任務成功
    pub fn failure_reason(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error_reason(error));
        }
        let first = self.failures.first()?;
        let reason = first
            .get("cause")
            .map(error_reason)
            .unwrap_or_else(|| first.to_string());
        Some(format!("{} failure(s), first: {}", self.failures.len(), reason))
    }
}

fn error_reason(error: &Value) -> String {
    let kind = error.get("type").and_then(Value::as_str);
    let reason = error.get("reason").and_then(Value::as_str);
    match (kind, reason) {
        (Some(kind), Some(reason)) => format!("{}: {}", kind, reason),
        (None, Some(reason)) => reason.to_string(),
        _ => error.to_string(),
    }
}

/// `POST /_reindex` 的參數
#[derive(Debug, Clone, PartialEq)]
pub struct ReindexRequest {
    pub source: String,
    pub dest: String,
    pub batch_size: Option<u32>,
    pub slices: Option<String>,
    pub requests_per_second: Option<f64>,
    pub proceed_on_conflicts: bool,
    pub create_only: bool,
    pub query: Option<Value>,
}

impl ReindexRequest {
    pub fn new(source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            batch_size: None,
            slices: None,
            requests_per_second: None,
            proceed_on_conflicts: false,
            create_only: false,
            query: None,
        }
    }

    pub fn body(&self) -> Value {
        let mut source = Map::new();
        source.insert("index".to_string(), Value::String(self.source.clone()));
        if let Some(size) = self.batch_size {
            source.insert("size".to_string(), Value::from(size));
        }
        if let Some(query) = &self.query {
            source.insert("query".to_string(), query.clone());
        }

        let mut dest = Map::new();
        dest.insert("index".to_string(), Value::String(self.dest.clone()));
        if self.create_only {
            dest.insert("op_type".to_string(), Value::String("create".to_string()));
        }

        let mut body = Map::new();
        body.insert("source".to_string(), Value::Object(source));
        body.insert("dest".to_string(), Value::Object(dest));
        if self.proceed_on_conflicts {
            body.insert("conflicts".to_string(), Value::String("proceed".to_string()));
        }
        Value::Object(body)
    }

    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("wait_for_completion", "false".to_string())];
        if let Some(slices) = &self.slices {
            params.push(("slices", slices.clone()));
        }
        if let Some(rps) = self.requests_per_second {
            params.push(("requests_per_second", rps.to_string()));
        }
        params
    }
}

/// 單一索引上要執行的生命週期動作
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleAction {
    Delete,
    ForceMerge {
        max_num_segments: Option<u32>,
        only_expunge_deletes: bool,
    },
    Reroute {
        attribute: String,
        value: String,
    },
}

impl LifecycleAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::ForceMerge { .. } => "forcemerge",
            Self::Reroute { .. } => "reroute",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => write!(f, "delete"),
            Self::ForceMerge {
                max_num_segments: Some(n),
                ..
            } => write!(f, "forcemerge (max_num_segments={})", n),
            Self::ForceMerge {
                only_expunge_deletes: true,
                ..
            } => write!(f, "forcemerge (only_expunge_deletes)"),
            Self::ForceMerge { .. } => write!(f, "forcemerge"),
            Self::Reroute { attribute, value } => {
                write!(f, "reroute (require.{}={})", attribute, value)
            }
        }
    }
}
