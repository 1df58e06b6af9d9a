//! 内容生成工具：报告、摘要、文章等 Markdown 文本

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::plan::ToolKind;
use crate::tools::{Tool, ToolInput};

const SYSTEM_INSTRUCTION: &str = "You are a professional content writer. Produce cohesive, well-structured \
and detailed text that satisfies the given brief. Format the text in Markdown.";

pub struct ContentGeneratorTool {
    llm: Arc<dyn LlmClient>,
}

impl ContentGeneratorTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for ContentGeneratorTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ContentGenerator
    }

    fn description(&self) -> &str {
        "Write textual content (reports, summaries, articles) from a brief."
    }

    async fn invoke(&self, input: &ToolInput) -> Result<String, String> {
        self.llm
            .ask(SYSTEM_INSTRUCTION, &input.instruction)
            .await
            .map_err(|e| format!("Content generation error: {}", e))
    }
}
