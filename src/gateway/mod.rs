//! 网关层：HTTP 入口、后台任务队列、回调通知

pub mod http;
pub mod notifier;
pub mod task_queue;

pub use http::{create_router, AppState, WebhookRequest, WebhookResponse};
pub use notifier::{deliver, CallbackPayload, HttpNotifier, NoopNotifier, Notifier};
pub use task_queue::{
    new_task_id, RecoveryReport, SubmitReceipt, TaskJob, TaskRunner, TaskService, TaskWorker,
};
