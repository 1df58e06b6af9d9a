//! 错误类型
//!
//! 只有凭据缺失与编排级故障会让任务提前进入 FAILED；规划失败在 Planner 内部降级，
//! 工具失败在 ToolExecutor 内部转为结果字符串，通知失败只记日志。

use thiserror::Error;

use crate::store::StoreError;

/// 规划阶段错误（永不越过 Planner 边界）
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("LLM backend error: {0}")]
    Backend(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("Invalid plan: {0}")]
    Invalid(String),
}

/// 任务运行错误：导致任务以 FAILED 结束
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("{0} is not configured in the server environment")]
    CredentialMissing(String),

    #[error("Task store error: {0}")]
    Store(#[from] StoreError),

    #[error("Task runner panicked: {0}")]
    Panicked(String),

    #[error("Orchestration fault: {0}")]
    Orchestration(String),

    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),
}

impl TaskError {
    /// 写入任务记录 result 字段的诊断文本
    pub fn diagnostic(&self) -> String {
        match self {
            TaskError::CredentialMissing(_) | TaskError::InvalidSubmission(_) => {
                format!("ERROR: {}", self)
            }
            _ => format!("CRITICAL ERROR during task execution: {}", self),
        }
    }
}
