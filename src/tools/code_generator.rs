//! 代码生成工具：按步骤描述生成完整代码，去掉 Markdown 围栏后返回纯源码
//!
//! 输出会作为下一步 code_execution 的执行载荷，因此必须是可直接运行的源码。

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::llm::LlmClient;
use crate::plan::ToolKind;
use crate::tools::{Tool, ToolInput};

pub struct CodeGeneratorTool {
    llm: Arc<dyn LlmClient>,
    language: String,
}

impl CodeGeneratorTool {
    pub fn new(llm: Arc<dyn LlmClient>, language: impl Into<String>) -> Self {
        Self {
            llm,
            language: language.into(),
        }
    }

    fn system_instruction(&self) -> String {
        format!(
            "You are a specialised code generator. Your only job is to write complete, working {} code \
             that satisfies the description. Do NOT include explanations, excessive comments or any text \
             before or after the code. The code must be the only content of your answer, formatted as a \
             Markdown code block.",
            self.language
        )
    }
}

/// 若整段文本是一个 Markdown 代码块，取出其中的源码；否则原样返回（去首尾空白）
pub fn strip_code_fence(text: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE.get_or_init(|| {
        Regex::new(r"(?s)\A```[\w+#.-]*[ \t]*\r?\n(.*?)\r?\n?```\z").expect("valid fence regex")
    });
    let trimmed = text.trim();
    match re.captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().to_string(),
        None => trimmed.to_string(),
    }
}

#[async_trait]
impl Tool for CodeGeneratorTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CodeGenerator
    }

    fn description(&self) -> &str {
        "Generate complete source code from a description (default language: python)."
    }

    async fn invoke(&self, input: &ToolInput) -> Result<String, String> {
        tracing::info!(language = %self.language, "generating code");
        let prompt = format!(
            "Generate the following code in {}: {}",
            self.language, input.instruction
        );
        let text = self
            .llm
            .ask(&self.system_instruction(), &prompt)
            .await
            .map_err(|e| format!("Code generation error: {}", e))?;
        Ok(strip_code_fence(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```python\nprint('hi')\n```"), "print('hi')");
        assert_eq!(strip_code_fence("```\na = 1\nb = 2\n```\n"), "a = 1\nb = 2");
        assert_eq!(strip_code_fence("print('raw')"), "print('raw')");
        // 围栏不在两端时不处理
        assert_eq!(
            strip_code_fence("Here:\n```py\nx\n```"),
            "Here:\n```py\nx\n```"
        );
    }

    #[tokio::test]
    async fn test_invoke_uses_language_and_instruction() {
        let llm = Arc::new(MockLlmClient::scripted(["```python\nprint('hi')\n```"]));
        let tool = CodeGeneratorTool::new(llm.clone(), "python");
        let out = tool
            .invoke(&ToolInput::new("print hi", "ignored"))
            .await
            .unwrap();
        assert_eq!(out, "print('hi')");
        assert_eq!(llm.prompts()[0], "Generate the following code in python: print hi");
    }

    #[tokio::test]
    async fn test_backend_error_is_described() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_reply(Err("quota exceeded".into()));
        let tool = CodeGeneratorTool::new(llm, "python");
        let err = tool.invoke(&ToolInput::new("x", "")).await.unwrap_err();
        assert!(err.contains("quota exceeded"));
    }
}
