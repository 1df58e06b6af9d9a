//! 执行上下文：只保留最近一步的编号、工具与输出，每步之后整体替换，不持久化

use crate::plan::{Step, ToolKind};

/// 尚无任何步骤结果时的哨兵文本
pub const NO_PRIOR_RESULT: &str = "Start of execution. No previous result.";

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    step_id: Option<u32>,
    tool: Option<ToolKind>,
    output: String,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::initial()
    }
}

impl ExecutionContext {
    pub fn initial() -> Self {
        Self {
            step_id: None,
            tool: None,
            output: NO_PRIOR_RESULT.to_string(),
        }
    }

    /// 由刚完成的步骤及其结果构造新的上下文
    pub fn after(step: &Step, output: String) -> Self {
        Self {
            step_id: Some(step.step_id),
            tool: Some(step.tool_required.clone()),
            output,
        }
    }

    /// 产生该结果的工具；初始上下文为 None
    pub fn tool(&self) -> Option<&ToolKind> {
        self.tool.as_ref()
    }

    /// 上一步的原始输出（code_execution 的待执行代码即取自这里）
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl std::fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.step_id {
            Some(id) => write!(f, "Result of step {}: {}", id, self.output),
            None => f.write_str(&self.output),
        }
    }
}
