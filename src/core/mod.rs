//! 核心编排层：错误类型、执行上下文、计划-执行主循环

pub mod context;
pub mod error;
pub mod orchestrator;

pub use context::{ExecutionContext, NO_PRIOR_RESULT};
pub use error::{PlanError, TaskError};
pub use orchestrator::Orchestrator;
