use crate::config::{ConnectionSettings, Credentials};
use crate::domain::model::{
    IndexInfo, IndexState, NodeInfo, ReindexRequest, ShardRouting, TaskStatus,
};
use crate::domain::ports::ClusterApi;
use crate::utils::error::{LifecycleError, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Map, Value};

/// Elasticsearch REST 用戶端
#[derive(Debug, Clone)]
pub struct EsClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl EsClient {
    pub fn new(settings: &ConnectionSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            credentials: settings.credentials.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(path));
        match &self.credentials {
            Some(Credentials::Basic { user, password }) => builder.basic_auth(user, password.as_ref()),
            Some(Credentials::ApiKey(key)) => builder.header(AUTHORIZATION, format!("ApiKey {}", key)),
            None => builder,
        }
    }

    /// 送出請求；非 2xx 轉為 ApiError 並保留回應內容
    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let request = builder.build()?;
        let method = request.method().to_string();
        let url = request.url().to_string();

        tracing::debug!("{} {}", method, url);
        let response = self.client.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!("{} {} -> {}", method, url, status);

        if !status.is_success() {
            return Err(LifecycleError::ApiError {
                method,
                url,
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn warn_unless_acknowledged(what: &str, body: &Value) {
    if body.get("acknowledged").and_then(Value::as_bool) == Some(false) {
        tracing::warn!("⚠️ {} was not acknowledged by all nodes", what);
    }
}

fn task_id(body: &Value) -> Option<String> {
    body.get("task").and_then(Value::as_str).map(str::to_string)
}

fn parse_indices(body: &Value) -> Vec<IndexInfo> {
    let Some(indices) = body
        .pointer("/metadata/indices")
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };

    let mut result: Vec<IndexInfo> = indices
        .iter()
        .map(|(name, meta)| {
            let state = match meta.get("state").and_then(Value::as_str) {
                Some("close") => IndexState::Close,
                _ => IndexState::Open,
            };
            let settings = meta.get("settings").cloned().unwrap_or(Value::Null);
            IndexInfo::new(name.clone(), state, settings)
        })
        .collect();
    result.sort_by(|a, b| a.name.cmp(&b.name));
    result
}

fn parse_routing(index: &str, body: &Value) -> Result<Vec<ShardRouting>> {
    let Some(shards) = body
        .get("routing_table")
        .and_then(|t| t.get("indices"))
        .and_then(|i| i.get(index))
        .and_then(|i| i.get("shards"))
        .and_then(Value::as_object)
    else {
        // 索引尚未建立 (例如 shrink 目標)
        return Ok(Vec::new());
    };

    let mut routing = Vec::new();
    for copies in shards.values() {
        let copies: Vec<ShardRouting> = serde_json::from_value(copies.clone())?;
        routing.extend(copies);
    }
    routing.sort_by_key(|s| (s.shard, !s.primary));
    Ok(routing)
}

fn parse_nodes(body: &Value) -> Vec<NodeInfo> {
    let mut nodes: Vec<NodeInfo> = body
        .get("nodes")
        .and_then(Value::as_object)
        .map(|nodes| {
            nodes
                .iter()
                .map(|(id, node)| NodeInfo {
                    id: id.clone(),
                    name: node
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or(id)
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    nodes
}

#[async_trait]
impl ClusterApi for EsClient {
    async fn start_reindex(&self, request: &ReindexRequest) -> Result<String> {
        let body = self
            .send(
                self.request(Method::POST, "_reindex")
                    .query(&request.query_params())
                    .json(&request.body()),
            )
            .await?;

        task_id(&body).ok_or_else(|| {
            LifecycleError::response(format!("_reindex returned no task id: {}", body))
        })
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskStatus> {
        let body = self
            .send(self.request(Method::GET, &format!("_tasks/{}", task_id)))
            .await?;
        Ok(TaskStatus::from_response(task_id, body)?)
    }

    async fn list_indices(&self, pattern: Option<&str>) -> Result<Vec<IndexInfo>> {
        let path = match pattern {
            Some(pattern) => format!("_cluster/state/metadata/{}", pattern),
            None => "_cluster/state/metadata".to_string(),
        };
        let body = self.send(self.request(Method::GET, &path)).await?;
        Ok(parse_indices(&body))
    }

    async fn shard_routing(&self, index: &str) -> Result<Vec<ShardRouting>> {
        let body = self
            .send(self.request(
                Method::GET,
                &format!("_cluster/state/routing_table/{}", index),
            ))
            .await;

        match body {
            Ok(body) => parse_routing(index, &body),
            Err(LifecycleError::ApiError { status: 404, .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn nodes(&self) -> Result<Vec<NodeInfo>> {
        let body = self
            .send(self.request(Method::GET, "_cluster/state/nodes"))
            .await?;
        Ok(parse_nodes(&body))
    }

    async fn update_settings(&self, index: &str, settings: Value) -> Result<()> {
        let body = self
            .send(
                self.request(Method::PUT, &format!("{}/_settings", index))
                    .json(&settings),
            )
            .await?;
        warn_unless_acknowledged(&format!("settings update of {}", index), &body);
        Ok(())
    }

    async fn shrink_index(&self, source: &str, target: &str, body: Value) -> Result<()> {
        let response = self
            .send(
                self.request(Method::POST, &format!("{}/_shrink/{}", source, target))
                    .json(&body),
            )
            .await?;
        warn_unless_acknowledged(&format!("shrink {} -> {}", source, target), &response);
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let body = self.send(self.request(Method::DELETE, index)).await?;
        warn_unless_acknowledged(&format!("deletion of {}", index), &body);
        Ok(())
    }

    async fn force_merge(
        &self,
        index: &str,
        max_num_segments: Option<u32>,
        only_expunge_deletes: bool,
    ) -> Result<Option<String>> {
        let mut params = vec![("wait_for_completion", "false".to_string())];
        if let Some(n) = max_num_segments {
            params.push(("max_num_segments", n.to_string()));
        }
        if only_expunge_deletes {
            params.push(("only_expunge_deletes", "true".to_string()));
        }

        let body = self
            .send(
                self.request(Method::POST, &format!("{}/_forcemerge", index))
                    .query(&params),
            )
            .await?;
        Ok(task_id(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = EsClient::new(&ConnectionSettings::new("http://es:9200/")).unwrap();
        assert_eq!(client.endpoint("/_tasks/a:1"), "http://es:9200/_tasks/a:1");
        assert_eq!(client.endpoint("logs/_settings"), "http://es:9200/logs/_settings");

        let prefixed = EsClient::new(&ConnectionSettings::new("https://proxy/es")).unwrap();
        assert_eq!(prefixed.endpoint("_reindex"), "https://proxy/es/_reindex");
    }

    #[test]
    fn test_parse_indices_sorted_with_state() {
        let body = json!({"metadata": {"indices": {
            "logs-b": {"state": "close", "settings": {"index": {"number_of_shards": "1"}}},
            "logs-a": {"state": "open", "settings": {}}
        }}});

        let indices = parse_indices(&body);
        assert_eq!(indices.len(), 2);
        assert_eq!(indices[0].name, "logs-a");
        assert!(indices[0].is_open());
        assert!(!indices[1].is_open());
        assert_eq!(indices[1].setting("index.number_of_shards").as_deref(), Some("1"));

        assert!(parse_indices(&json!({"metadata": {}})).is_empty());
    }

    #[test]
    fn test_parse_routing_and_nodes() {
        let body = json!({"routing_table": {"indices": {"logs": {"shards": {
            "1": [{"index": "logs", "shard": 1, "primary": true, "state": "STARTED", "node": "n2", "relocating_node": null}],
            "0": [
                {"index": "logs", "shard": 0, "primary": false, "state": "UNASSIGNED", "node": null, "relocating_node": null},
                {"index": "logs", "shard": 0, "primary": true, "state": "RELOCATING", "node": "n1", "relocating_node": "n2"}
            ]
        }}}}});

        let routing = parse_routing("logs", &body).unwrap();
        assert_eq!(routing.len(), 3);
        assert!(routing[0].primary && routing[0].shard == 0);
        assert_eq!(routing[0].relocating_node.as_deref(), Some("n2"));
        assert!(routing[1].node.is_none());
        assert!(routing[2].is_settled_on("n2"));

        assert!(parse_routing("other", &body).unwrap().is_empty());

        let nodes = parse_nodes(&json!({"nodes": {"x9": {"name": "es-b"}, "a1": {"name": "es-a"}}}));
        assert_eq!(nodes[0], NodeInfo { id: "a1".to_string(), name: "es-a".to_string() });
    }
}
