//! 任务存储：任务记录的唯一可信来源
//!
//! TaskStore 提供 create / update_status / get；SqliteTaskStore 落盘（重启后仍可查询），
//! InMemoryTaskStore 供测试与无持久化场景使用。终态（COMPLETED / FAILED）不可再迁出。

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryTaskStore;
pub use sqlite::SqliteTaskStore;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// 已提交，等待执行
    Pending,
    /// 执行器已接手
    InProgress,
    /// 正常结束
    Completed,
    /// 凭据缺失或编排异常
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "COMPLETED" => Some(TaskStatus::Completed),
            "FAILED" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务记录（对外查询的完整视图）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub description: String,
    pub callback_url: Option<String>,
    pub status: TaskStatus,
    /// 仅终态时存在
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(id: &str, description: &str, callback_url: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            description: description.to_string(),
            callback_url: callback_url.map(String::from),
            status: TaskStatus::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 应用一次状态迁移；终态记录拒绝再迁移，非终态不携带 result
    pub(crate) fn transition(&mut self, status: TaskStatus, result: Option<&str>) -> Result<(), StoreError> {
        if self.status.is_terminal() {
            return Err(StoreError::TerminalState {
                id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = status;
        if status.is_terminal() {
            self.result = result.map(String::from);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// 存储层错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task already exists: {0}")]
    AlreadyExists(String),

    #[error("Task {id} is already {status}")]
    TerminalState { id: String, status: TaskStatus },

    #[error("Corrupt task row {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// 任务存储 trait：创建 / 更新状态 / 查询
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// 以 PENDING 状态创建记录
    async fn create(
        &self,
        id: &str,
        description: &str,
        callback_url: Option<&str>,
    ) -> Result<TaskRecord, StoreError>;

    /// 更新状态（每次调用刷新 updated_at）；result 仅在终态写入
    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        result: Option<&str>,
    ) -> Result<TaskRecord, StoreError>;

    /// 查询；未知 id 返回 Ok(None)
    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, StoreError>;

    /// 按状态列出（重启恢复用），按创建时间升序
    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::parse("RUNNING"), None);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = TaskRecord::new("task-1", "demo", Some("http://cb"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["callbackUrl"], "http://cb");
        assert!(json.get("createdAt").is_some());
        assert!(json["result"].is_null());
    }

    #[test]
    fn test_transition_refuses_terminal() {
        let mut record = TaskRecord::new("task-1", "demo", None);
        record.transition(TaskStatus::InProgress, Some("ignored")).unwrap();
        assert_eq!(record.result, None);
        record.transition(TaskStatus::Completed, Some("done")).unwrap();
        assert_eq!(record.result.as_deref(), Some("done"));
        let err = record.transition(TaskStatus::Failed, Some("late")).unwrap_err();
        assert!(matches!(err, StoreError::TerminalState { .. }));
        assert_eq!(record.status, TaskStatus::Completed);
    }
}
