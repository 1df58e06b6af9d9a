//! 内存版任务存储（测试 / 无持久化运行）

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StoreError, TaskRecord, TaskStatus, TaskStore};

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, TaskRecord>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(
        &self,
        id: &str,
        description: &str,
        callback_url: Option<&str>,
    ) -> Result<TaskRecord, StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        let record = TaskRecord::new(id, description, callback_url);
        tasks.insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        result: Option<&str>,
    ) -> Result<TaskRecord, StoreError> {
        let mut tasks = self.tasks.write().await;
        let record = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.transition(status, result)?;
        Ok(record.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, StoreError> {
        let mut records: Vec<TaskRecord> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
