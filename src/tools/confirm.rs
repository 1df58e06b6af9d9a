//! `none` 步骤：不调用外部工具，由模型确认步骤完成并小结当前状态（仍可能失败）

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::plan::ToolKind;
use crate::tools::{Tool, ToolInput};

const SYSTEM_INSTRUCTION: &str = "You are the progress reviewer of an autonomous task runner.";

pub struct ConfirmTool {
    llm: Arc<dyn LlmClient>,
}

impl ConfirmTool {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tool for ConfirmTool {
    fn kind(&self) -> ToolKind {
        ToolKind::None
    }

    fn description(&self) -> &str {
        "Confirm a step that needs no tool and summarise the current state."
    }

    async fn invoke(&self, input: &ToolInput) -> Result<String, String> {
        let prompt = format!(
            "Confirm completion of the step: '{}'. Previous context: {}. \
             Provide a brief confirmation and a summary of the current state.",
            input.instruction, input.context
        );
        self.llm
            .ask(SYSTEM_INSTRUCTION, &prompt)
            .await
            .map_err(|e| format!("Error while running step 'none': {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_prompt_carries_description_and_context() {
        let llm = Arc::new(MockLlmClient::scripted(["confirmed"]));
        let tool = ConfirmTool::new(llm.clone());
        let out = tool
            .invoke(&ToolInput::new("publish report", "Result of step 1: draft"))
            .await
            .unwrap();
        assert_eq!(out, "confirmed");
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("publish report"));
        assert!(prompt.contains("Result of step 1: draft"));
    }
}
