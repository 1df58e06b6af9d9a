//! 回调通知：任务成功后向调用方提供的 URL POST 最终结果
//!
//! 单次尝试、不重试；失败（网络错误 / 非 2xx）只记日志，绝不影响任务记录。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::store::TaskStatus;

/// 回调请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub task_id: String,
    pub status: TaskStatus,
    pub result: String,
}

/// 通知器 trait
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, callback_url: &str, payload: &CallbackPayload) -> Result<(), String>;
}

/// HTTP 通知器（reqwest）
pub struct HttpNotifier {
    client: Client,
}

impl HttpNotifier {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, callback_url: &str, payload: &CallbackPayload) -> Result<(), String> {
        let resp = self
            .client
            .post(callback_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| format!("Callback request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("Callback returned HTTP {}", resp.status()));
        }
        Ok(())
    }
}

/// 不做任何事的通知器（未配置回调时的占位 / 测试）
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _callback_url: &str, _payload: &CallbackPayload) -> Result<(), String> {
        Ok(())
    }
}

/// 尽力投递：只记录结果，不返回错误
pub async fn deliver(notifier: &dyn Notifier, callback_url: &str, payload: &CallbackPayload) {
    match notifier.notify(callback_url, payload).await {
        Ok(()) => tracing::info!(task_id = %payload.task_id, url = %callback_url, "callback delivered"),
        Err(e) => tracing::warn!(
            task_id = %payload.task_id,
            url = %callback_url,
            error = %e,
            "callback delivery failed (not retried)"
        ),
    }
}
