//! SQLite 任务存储
//!
//! 单连接 + Mutex：所有读改写在同一把锁内完成，保证同一 id 的 status / result / updated_at 原子更新。
//! rusqlite 是同步 API，每次操作都放到 spawn_blocking 中执行。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{StoreError, TaskRecord, TaskStatus, TaskStore};

pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    /// 打开或创建数据库文件，并初始化表结构
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        info!("Task store opened: {}", path.display());
        Ok(store)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                task_description TEXT NOT NULL,
                callback_url TEXT,
                status TEXT NOT NULL,
                result TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在阻塞线程池上持锁执行一次数据库操作，不占用 async worker 线程
    async fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("connection lock poisoned: {}", e)))?;
            op(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, task_description, callback_url, status, result, created_at, updated_at FROM tasks";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<(TaskRecord, String)> {
    let status_raw: String = row.get(3)?;
    let record = TaskRecord {
        id: row.get(0)?,
        description: row.get(1)?,
        callback_url: row.get(2)?,
        status: TaskStatus::parse(&status_raw).unwrap_or(TaskStatus::Pending),
        result: row.get(4)?,
        created_at: row.get::<_, DateTime<Utc>>(5)?,
        updated_at: row.get::<_, DateTime<Utc>>(6)?,
    };
    Ok((record, status_raw))
}

/// 状态列必须是已知取值，否则视为损坏行
fn checked(pair: (TaskRecord, String)) -> Result<TaskRecord, StoreError> {
    let (record, raw) = pair;
    if TaskStatus::parse(&raw).is_none() {
        return Err(StoreError::Corrupt {
            id: record.id,
            reason: format!("unknown status '{}'", raw),
        });
    }
    Ok(record)
}

fn fetch(conn: &Connection, id: &str) -> Result<Option<TaskRecord>, StoreError> {
    let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
    conn.query_row(&sql, params![id], row_to_record)
        .optional()?
        .map(checked)
        .transpose()
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create(
        &self,
        id: &str,
        description: &str,
        callback_url: Option<&str>,
    ) -> Result<TaskRecord, StoreError> {
        let record = TaskRecord::new(id, description, callback_url);
        self.with_conn(move |conn| {
            if fetch(conn, &record.id)?.is_some() {
                return Err(StoreError::AlreadyExists(record.id));
            }
            conn.execute(
                "INSERT INTO tasks (id, task_description, callback_url, status, result, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)",
                params![
                    record.id,
                    record.description,
                    record.callback_url,
                    record.status.as_str(),
                    record.created_at,
                    record.updated_at,
                ],
            )?;
            Ok(record)
        })
        .await
    }

    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        result: Option<&str>,
    ) -> Result<TaskRecord, StoreError> {
        let id = id.to_string();
        let result = result.map(String::from);
        self.with_conn(move |conn| {
            let mut record = fetch(conn, &id)?.ok_or_else(|| StoreError::NotFound(id.clone()))?;
            record.transition(status, result.as_deref())?;
            conn.execute(
                "UPDATE tasks SET status = ?1, result = ?2, updated_at = ?3 WHERE id = ?4",
                params![record.status.as_str(), record.result, record.updated_at, record.id],
            )?;
            Ok(record)
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| fetch(conn, &id)).await
    }

    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!("{} WHERE status = ?1 ORDER BY created_at ASC", SELECT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status.as_str()], row_to_record)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(checked(row?)?);
            }
            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_update_get() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        store
            .create("task-1", "write and run a hello-world script", Some("http://cb.test"))
            .await
            .unwrap();

        let pending = store.get("task-1").await.unwrap().unwrap();
        assert_eq!(pending.status, TaskStatus::Pending);
        assert_eq!(pending.callback_url.as_deref(), Some("http://cb.test"));
        assert!(pending.result.is_none());

        let running = store
            .update_status("task-1", TaskStatus::InProgress, None)
            .await
            .unwrap();
        assert!(running.updated_at >= pending.updated_at);

        let done = store
            .update_status("task-1", TaskStatus::Completed, Some("hi"))
            .await
            .unwrap();
        assert!(done.updated_at >= running.updated_at);

        let fetched = store.get("task-1").await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Completed);
        assert_eq!(fetched.result.as_deref(), Some("hi"));
        assert_eq!(fetched.created_at, pending.created_at);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        assert!(store.get("nope").await.unwrap().is_none());
        assert!(matches!(
            store.update_status("nope", TaskStatus::InProgress, None).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_result_distinct_from_missing() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        store.create("t", "desc", None).await.unwrap();
        store.update_status("t", TaskStatus::InProgress, None).await.unwrap();
        store.update_status("t", TaskStatus::Completed, Some("")).await.unwrap();
        let record = store.get("t").await.unwrap().unwrap();
        assert_eq!(record.result.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        store.create("t", "desc", None).await.unwrap();
        store.update_status("t", TaskStatus::Failed, Some("boom")).await.unwrap();
        let err = store
            .update_status("t", TaskStatus::Completed, Some("late"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TerminalState { .. }));
        let record = store.get("t").await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.result.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        store.create("t", "desc", None).await.unwrap();
        assert!(matches!(
            store.create("t", "again", None).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lifecycles() {
        let store = Arc::new(SqliteTaskStore::open_in_memory().unwrap());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let id = format!("task-{}", i);
                store.create(&id, "parallel", None).await.unwrap();
                store.update_status(&id, TaskStatus::InProgress, None).await.unwrap();
                store
                    .update_status(&id, TaskStatus::Completed, Some(&format!("done {}", i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let done = store.list_by_status(TaskStatus::Completed).await.unwrap();
        assert_eq!(done.len(), 16);
        let record = store.get("task-7").await.unwrap().unwrap();
        assert_eq!(record.result.as_deref(), Some("done 7"));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("tasks.db");

        {
            let store = SqliteTaskStore::open(&db_path).unwrap();
            store.create("a", "first", None).await.unwrap();
            store.create("b", "second", None).await.unwrap();
            store.update_status("b", TaskStatus::InProgress, None).await.unwrap();
        }

        let store = SqliteTaskStore::open(&db_path).unwrap();
        let pending = store.list_by_status(TaskStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "a");
        let running = store.list_by_status(TaskStatus::InProgress).await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].description, "second");
    }
}
