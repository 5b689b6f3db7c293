use crate::core::poller::Poller;
use crate::domain::model::TaskStatus;
use crate::domain::ports::ClusterApi;
use crate::utils::error::{LifecycleError, Result};

/// 輪詢 `_tasks/{id}` 直到完成；任務失敗時回傳 TaskFailed
pub async fn wait_for_task<C>(cluster: &C, poller: &Poller, task_id: &str) -> Result<TaskStatus>
where
    C: ClusterApi + ?Sized,
{
    let status = poller
        .until(&format!("task {}", task_id), move || async move {
            let status = cluster.get_task(task_id).await?;
            if status.completed {
                return Ok(Some(status));
            }
            tracing::info!("⏳ Task {}: {}", task_id, status.progress);
            Ok(None)
        })
        .await?;

    if let Some(reason) = status.failure_reason() {
        return Err(LifecycleError::TaskFailed {
            task_id: task_id.to_string(),
            reason,
        });
    }
    Ok(status)
}
