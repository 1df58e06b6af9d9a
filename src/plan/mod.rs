//! 计划模型：Plan / Step / ToolKind
//!
//! Plan 由 Planner 一次性生成后只读；ToolKind 是封闭枚举加 `Unsupported` 兜底分支，
//! 模型给出的未知工具名会被保留下来，由执行器转成「unsupported tool」结果而不是报错。

pub mod planner;

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

pub use planner::{parse_plan, Planner, TaskPlanner};

/// 步骤所需工具
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ToolKind {
    CodeGenerator,
    CodeExecution,
    ContentGenerator,
    WebScraper,
    DataAnalyzer,
    /// 无需外部工具：由模型确认 / 小结
    None,
    /// 不在已知集合中的工具名（原样保留）
    Unsupported(String),
}

impl ToolKind {
    /// 已知工具（不含 Unsupported），顺序即 prompt 中的展示顺序
    pub const KNOWN: [ToolKind; 6] = [
        ToolKind::CodeGenerator,
        ToolKind::CodeExecution,
        ToolKind::ContentGenerator,
        ToolKind::WebScraper,
        ToolKind::DataAnalyzer,
        ToolKind::None,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ToolKind::CodeGenerator => "code_generator",
            ToolKind::CodeExecution => "code_execution",
            ToolKind::ContentGenerator => "content_generator",
            ToolKind::WebScraper => "web_scraper",
            ToolKind::DataAnalyzer => "data_analyzer",
            ToolKind::None => "none",
            ToolKind::Unsupported(name) => name,
        }
    }
}

impl From<String> for ToolKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "code_generator" => ToolKind::CodeGenerator,
            "code_execution" => ToolKind::CodeExecution,
            "content_generator" => ToolKind::ContentGenerator,
            "web_scraper" => ToolKind::WebScraper,
            "data_analyzer" => ToolKind::DataAnalyzer,
            "none" => ToolKind::None,
            _ => ToolKind::Unsupported(raw),
        }
    }
}

impl From<&str> for ToolKind {
    fn from(raw: &str) -> Self {
        ToolKind::from(raw.to_string())
    }
}

impl From<ToolKind> for String {
    fn from(kind: ToolKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 计划中的单个步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    /// 步骤编号，从 1 开始严格递增
    pub step_id: u32,
    /// 本步骤要执行的动作，清晰简洁
    pub description: String,
    /// 本步骤所需工具：code_generator、code_execution、content_generator、web_scraper、data_analyzer 或 none
    #[schemars(with = "String")]
    pub tool_required: ToolKind,
}

impl Step {
    pub fn new(step_id: u32, description: impl Into<String>, tool_required: impl Into<ToolKind>) -> Self {
        Self {
            step_id,
            description: description.into(),
            tool_required: tool_required.into(),
        }
    }
}

/// 完整计划：总体目标 + 顺序步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// 任务的总体目标
    #[serde(rename = "task_goal", alias = "goal")]
    pub goal: String,
    /// 达成目标的顺序步骤列表
    #[serde(alias = "phases")]
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            goal: goal.into(),
            steps,
        }
    }

    /// 规划失败时的降级计划：唯一一步，工具为 none，保证执行器仍能走到终态
    pub fn degraded(goal: &str, reason: &str) -> Self {
        Self::new(
            goal,
            vec![Step::new(
                1,
                format!("Planning failed ({}). Retry the task.", reason),
                ToolKind::None,
            )],
        )
    }

    /// 校验：至少一步，step_id 从 1 开始严格递增
    pub fn validate(&self) -> Result<(), String> {
        let first = self.steps.first().ok_or_else(|| "plan has no steps".to_string())?;
        if first.step_id != 1 {
            return Err(format!("first step_id must be 1, got {}", first.step_id));
        }
        for pair in self.steps.windows(2) {
            if pair[1].step_id <= pair[0].step_id {
                return Err(format!(
                    "step_id must be strictly increasing ({} followed by {})",
                    pair[0].step_id, pair[1].step_id
                ));
            }
        }
        Ok(())
    }
}

/// 返回 Plan 的 JSON Schema 字符串，拼入规划 prompt
pub fn plan_schema() -> serde_json::Value {
    serde_json::to_value(schema_for!(Plan)).unwrap_or_default()
}

pub fn plan_schema_json() -> String {
    serde_json::to_string_pretty(&plan_schema()).unwrap_or_default()
}
