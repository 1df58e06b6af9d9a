//! 后台任务队列
//!
//! 提交即返回：submit 以 PENDING 写入任务记录并把 TaskJob 放入队列；TaskWorker 出队后交给
//! TaskRunner 执行。调用方只能通过 TaskStore 观察完成情况。
//!
//! 核心功能：
//! - 凭据缺失时直接 FAILED，不进入规划
//! - 每个任务在独立 tokio task 中运行，panic 也会被转成 FAILED
//! - 多个任务并发（Semaphore 限流），单个任务内部步骤严格串行
//! - 成功且带回调 URL 时尽力通知
//! - 重启恢复：PENDING 重新入队，遗留的 IN_PROGRESS 标记为 FAILED

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use crate::config::Credentials;
use crate::core::orchestrator::mark_failed;
use crate::core::{Orchestrator, TaskError};
use crate::gateway::notifier::{deliver, CallbackPayload, Notifier};
use crate::store::{StoreError, TaskRecord, TaskStatus, TaskStore};

/// 队列中的一个待执行任务
#[derive(Debug, Clone, PartialEq)]
pub struct TaskJob {
    pub task_id: String,
    pub description: String,
    pub callback_url: Option<String>,
}

impl From<&TaskRecord> for TaskJob {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.id.clone(),
            description: record.description.clone(),
            callback_url: record.callback_url.clone(),
        }
    }
}

/// 提交回执
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub task_id: String,
    pub message: String,
}

/// 重启恢复统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub requeued: usize,
    pub interrupted: usize,
}

/// 生成调用方无关、抗碰撞的任务 ID
pub fn new_task_id() -> String {
    format!("task-{}", uuid::Uuid::new_v4().simple())
}

/// 提交 / 查询入口（供 HTTP 层使用）
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    queue_tx: mpsc::UnboundedSender<TaskJob>,
}

impl TaskService {
    /// 创建服务，返回队列接收端（交给 TaskWorker）
    pub fn new(store: Arc<dyn TaskStore>) -> (Self, mpsc::UnboundedReceiver<TaskJob>) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        (Self { store, queue_tx }, queue_rx)
    }

    pub fn store(&self) -> Arc<dyn TaskStore> {
        Arc::clone(&self.store)
    }

    /// 提交新任务：写入 PENDING 记录后入队，立即返回
    pub async fn submit(
        &self,
        description: &str,
        callback_url: Option<&str>,
    ) -> Result<SubmitReceipt, TaskError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(TaskError::InvalidSubmission(
                "taskDescription must not be empty".to_string(),
            ));
        }
        let callback_url = callback_url.map(str::trim).filter(|u| !u.is_empty());

        let task_id = new_task_id();
        self.store.create(&task_id, description, callback_url).await?;

        let job = TaskJob {
            task_id: task_id.clone(),
            description: description.to_string(),
            callback_url: callback_url.map(String::from),
        };
        if self.queue_tx.send(job).is_err() {
            let err = TaskError::Orchestration("task worker is not running".to_string());
            mark_failed(self.store.as_ref(), &task_id, &err).await;
            return Err(err);
        }
        tracing::info!(task_id = %task_id, "task submitted");

        let message = match callback_url {
            Some(url) => format!(
                "Task '{}' received and started in the background. The result will be sent to {}.",
                description, url
            ),
            None => format!(
                "Task '{}' received and started in the background. Poll /tasks/{} for the result.",
                description, task_id
            ),
        };
        Ok(SubmitReceipt { task_id, message })
    }

    /// 查询任务；未知 id 返回 Ok(None)
    pub async fn query(&self, task_id: &str) -> Result<Option<TaskRecord>, StoreError> {
        self.store.get(task_id).await
    }

    /// 启动时恢复：PENDING 重新入队，遗留 IN_PROGRESS（上个进程中断）标记为 FAILED
    pub async fn recover(&self) -> Result<RecoveryReport, StoreError> {
        let mut report = RecoveryReport::default();

        // 单条记录写入失败不影响其余记录的恢复
        for record in self.store.list_by_status(TaskStatus::InProgress).await? {
            match self
                .store
                .update_status(
                    &record.id,
                    TaskStatus::Failed,
                    Some("ERROR: task was interrupted by a service restart"),
                )
                .await
            {
                Ok(_) => report.interrupted += 1,
                Err(e) => tracing::error!(
                    task_id = %record.id,
                    error = %e,
                    "could not mark interrupted task as FAILED"
                ),
            }
        }

        for record in self.store.list_by_status(TaskStatus::Pending).await? {
            if self.queue_tx.send(TaskJob::from(&record)).is_ok() {
                report.requeued += 1;
            }
        }

        if report.requeued > 0 || report.interrupted > 0 {
            tracing::info!(
                "Restored {} pending tasks, failed {} interrupted tasks",
                report.requeued,
                report.interrupted
            );
        }
        Ok(report)
    }
}

/// 单个任务的执行者：凭据检查 → 编排 → 回调
pub struct TaskRunner {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    credentials: Credentials,
}

impl TaskRunner {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        credentials: Credentials,
    ) -> Self {
        Self {
            orchestrator,
            store,
            notifier,
            credentials,
        }
    }

    /// 运行到终态，返回最终状态
    pub async fn run(&self, job: TaskJob) -> TaskStatus {
        let task_id = job.task_id.clone();

        if !self.credentials.is_present() {
            let err = TaskError::CredentialMissing(self.credentials.api_key_env.clone());
            tracing::error!(task_id = %task_id, error = %err, "cannot start task");
            mark_failed(self.store.as_ref(), &task_id, &err).await;
            return TaskStatus::Failed;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let store = Arc::clone(&self.store);
        let description = job.description.clone();
        let run_id = task_id.clone();
        let handle = tokio::spawn(async move {
            orchestrator.run(&run_id, &description, store.as_ref()).await
        });

        match handle.await {
            Ok(Ok(result)) => {
                if let Some(url) = job.callback_url.as_deref() {
                    let payload = CallbackPayload {
                        task_id: task_id.clone(),
                        status: TaskStatus::Completed,
                        result,
                    };
                    deliver(self.notifier.as_ref(), url, &payload).await;
                } else {
                    tracing::info!(task_id = %task_id, "task finished without callback URL");
                }
                TaskStatus::Completed
            }
            // 编排器已写入 FAILED
            Ok(Err(_)) => TaskStatus::Failed,
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    join_err.to_string()
                };
                let err = TaskError::Panicked(reason);
                tracing::error!(task_id = %task_id, error = %err, "task runner crashed");
                mark_failed(self.store.as_ref(), &task_id, &err).await;
                TaskStatus::Failed
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 后台任务执行器：出队并发运行（受 max_concurrent 限制）
pub struct TaskWorker {
    runner: Arc<TaskRunner>,
    store: Arc<dyn TaskStore>,
    max_concurrent: usize,
}

impl TaskWorker {
    pub fn new(runner: Arc<TaskRunner>, store: Arc<dyn TaskStore>, max_concurrent: usize) -> Self {
        Self {
            runner,
            store,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// 启动执行器；发送端全部关闭后返回
    pub async fn start(self, mut queue_rx: mpsc::UnboundedReceiver<TaskJob>) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        while let Some(job) = queue_rx.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };

            let runner = Arc::clone(&self.runner);
            let store = Arc::clone(&self.store);

            tokio::spawn(async move {
                let _permit = permit;

                // 只执行仍处于 PENDING 的任务（避免恢复时重复运行）
                match store.get(&job.task_id).await {
                    Ok(Some(record)) if record.status == TaskStatus::Pending => {}
                    Ok(_) => {
                        tracing::debug!(task_id = %job.task_id, "skipping job that is no longer pending");
                        return;
                    }
                    Err(e) => {
                        tracing::error!(task_id = %job.task_id, error = %e, "cannot load task");
                        return;
                    }
                }

                let task_id = job.task_id.clone();
                let status = runner.run(job).await;
                tracing::info!(task_id = %task_id, status = %status, "task finished");
            });
        }
    }
}
