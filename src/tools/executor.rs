//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，invoke(kind, input) 在超时内调用对应工具；
//! 未知工具、未注册工具、工具失败、超时全部转为描述性字符串（步骤结果），从不向执行器抛错。
//! 每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::plan::ToolKind;
use crate::tools::{ToolInput, ToolRegistry};

/// 工具执行器：对每次调用施加超时，并将失败映射为结果文本
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self::with_timeout(registry, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// 调用指定工具；返回值总是可作为步骤结果的文本
    pub async fn invoke(&self, kind: &ToolKind, input: ToolInput) -> String {
        let tool = match kind {
            ToolKind::Unsupported(name) => {
                tracing::warn!(tool = %name, "unsupported tool requested by plan");
                return format!("unsupported tool: {}", name);
            }
            known => match self.registry.get(known) {
                Some(tool) => tool,
                None => {
                    tracing::warn!(tool = %known, "tool not registered");
                    return format!("tool not available: {}", known);
                }
            },
        };

        let start = Instant::now();
        let input_preview = preview(&input.instruction);
        let result = timeout(self.timeout, tool.invoke(&input)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": kind.as_str(),
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "input_preview": input_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => format!("Tool {} failed: {}", kind, e),
            Err(_) => format!(
                "Tool {} timed out after {}s",
                kind,
                self.timeout.as_secs_f64()
            ),
        }
    }

    /// 已注册工具的 (name, description)，按名称排序
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.registry.tool_descriptions()
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;

    struct FixedTool(ToolKind, Result<String, String>);

    #[async_trait]
    impl Tool for FixedTool {
        fn kind(&self) -> ToolKind {
            self.0.clone()
        }
        fn description(&self) -> &str {
            "fixed"
        }
        async fn invoke(&self, _input: &ToolInput) -> Result<String, String> {
            self.1.clone()
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn kind(&self) -> ToolKind {
            ToolKind::WebScraper
        }
        fn description(&self) -> &str {
            "slow"
        }
        async fn invoke(&self, _input: &ToolInput) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(FixedTool(ToolKind::ContentGenerator, Ok("article".into())));
        registry.register(FixedTool(ToolKind::DataAnalyzer, Err("backend down".into())));
        registry.register(SlowTool);
        ToolExecutor::with_timeout(registry, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let out = executor()
            .invoke(&ToolKind::ContentGenerator, ToolInput::new("brief", "ctx"))
            .await;
        assert_eq!(out, "article");
    }

    #[tokio::test]
    async fn test_failure_becomes_text() {
        let out = executor()
            .invoke(&ToolKind::DataAnalyzer, ToolInput::new("x", "y"))
            .await;
        assert!(out.contains("data_analyzer failed: backend down"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_text() {
        let out = executor()
            .invoke(&ToolKind::WebScraper, ToolInput::new("x", "y"))
            .await;
        assert!(out.contains("timed out"));
    }

    #[tokio::test]
    async fn test_unsupported_and_unregistered() {
        let exec = executor();
        let out = exec
            .invoke(&ToolKind::from("image_editor"), ToolInput::new("x", "y"))
            .await;
        assert_eq!(out, "unsupported tool: image_editor");

        let out = exec.invoke(&ToolKind::CodeExecution, ToolInput::new("x", "y")).await;
        assert_eq!(out, "tool not available: code_execution");
    }
}
