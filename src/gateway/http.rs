//! Webhook HTTP 入口（axum）
//!
//! - POST /webhook：提交任务，立即返回 taskId（不等待执行）
//! - GET /tasks/:id：查询任务记录
//! - GET /：存活检查

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::TaskError;
use crate::gateway::task_queue::TaskService;

/// POST /webhook 请求体（camelCase，兼容 snake_case）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default, alias = "task_description")]
    pub task_description: String,
    #[serde(default, alias = "callback_url")]
    pub callback_url: Option<String>,
}

/// POST /webhook 响应体
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub status: String,
    pub message: String,
    pub task_id: String,
}

/// 路由共享状态
pub struct AppState {
    pub service: TaskService,
}

/// 创建路由
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/webhook", post(webhook_submit))
        .route("/tasks/:id", get(task_get))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// POST /webhook
async fn webhook_submit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WebhookRequest>,
) -> Response {
    match state
        .service
        .submit(&req.task_description, req.callback_url.as_deref())
        .await
    {
        Ok(receipt) => Json(WebhookResponse {
            status: "pending".to_string(),
            message: receipt.message,
            task_id: receipt.task_id,
        })
        .into_response(),
        Err(TaskError::InvalidSubmission(msg)) => error_response(StatusCode::BAD_REQUEST, msg),
        Err(e) => {
            tracing::error!(error = %e, "task submission failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /tasks/:id
async fn task_get(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.service.query(&id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("task not found: {}", id)),
        Err(e) => {
            tracing::error!(task_id = %id, error = %e, "task lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
