//! Planner：把任务目标转换为结构化计划
//!
//! 单次结构化调用 LLM：由 schemars 生成的 Plan JSON Schema 既作为 response_format 发给后端，
//! 也写进 system prompt（不支持 schema 的后端仍能照做）；parse_plan 从回复中提取 JSON 并校验。任何失败（后端错误 / 非法 JSON / 校验不通过）
//! 都不会向上传播，而是返回单步降级计划。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::PlanError;
use crate::llm::{LlmClient, Message};
use crate::plan::{plan_schema, plan_schema_json, Plan, ToolKind};

/// 规划接口：总能返回一个计划
#[async_trait]
pub trait TaskPlanner: Send + Sync {
    async fn create_plan(&self, goal: &str) -> Plan;

    /// 规划后端的累计 token 使用 (prompt, completion, total)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 从 LLM 输出中解析计划：支持 ```json 围栏或裸 JSON
pub fn parse_plan(output: &str) -> Result<Plan, PlanError> {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end < start {
            return Err(PlanError::JsonParse(format!("no JSON object in: {}", preview(trimmed))));
        }
        &trimmed[start..=end]
    } else {
        return Err(PlanError::JsonParse(format!("no JSON object in: {}", preview(trimmed))));
    };

    let plan: Plan = serde_json::from_str(json_str)
        .map_err(|e| PlanError::JsonParse(format!("{}: {}", e, preview(json_str))))?;
    plan.validate().map_err(PlanError::Invalid)?;
    Ok(plan)
}

fn preview(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

/// LLM 驱动的 Planner
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: default_system_prompt(),
        }
    }

    fn user_prompt(goal: &str) -> String {
        format!(
            "The task is: '{}'. Create a detailed plan: state the overall goal and list the steps in order. \
             For each step, name exactly one tool.",
            goal
        )
    }

    /// 调用 LLM 并解析；错误以 PlanError 返回（create_plan 负责降级）
    pub async fn try_create_plan(&self, goal: &str) -> Result<Plan, PlanError> {
        let messages = [
            Message::system(self.system_prompt.as_str()),
            Message::user(Self::user_prompt(goal)),
        ];
        let raw = self
            .llm
            .complete_structured(&messages, "task_plan", &plan_schema())
            .await
            .map_err(PlanError::Backend)?;
        parse_plan(&raw)
    }
}

#[async_trait]
impl TaskPlanner for Planner {
    async fn create_plan(&self, goal: &str) -> Plan {
        match self.try_create_plan(goal).await {
            Ok(plan) => {
                tracing::info!(goal = %plan.goal, steps = plan.steps.len(), "plan created");
                plan
            }
            Err(e) => {
                tracing::warn!(error = %e, "planning failed, using degraded plan");
                Plan::degraded(goal, &e.to_string())
            }
        }
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }
}

fn default_system_prompt() -> String {
    let tools = ToolKind::KNOWN
        .iter()
        .map(|t| format!("'{}'", t.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You are an autonomous task planner. Turn a complex task into a sequential plan of steps.\n\
         Allowed tools for `tool_required`: {}.\n\
         A `code_execution` step runs the code produced by the step immediately before it, so it must \
         directly follow a `code_generator` step.\n\
         Number steps from 1. Reply with a single JSON object matching this JSON Schema and nothing else:\n{}",
        tools,
        plan_schema_json()
    )
}
