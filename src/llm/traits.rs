//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient：complete 返回完整文本；
//! 失败以 String 描述返回，由调用方决定是降级（Planner）还是转成步骤结果（工具）。

use async_trait::async_trait;

use crate::llm::Message;

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 结构化输出：要求后端按给定 JSON Schema 回复；默认退回普通完成，调用方仍需自行校验
    async fn complete_structured(
        &self,
        messages: &[Message],
        _schema_name: &str,
        _schema: &serde_json::Value,
    ) -> Result<String, String> {
        self.complete(messages).await
    }

    /// 便捷方法：一条 system + 一条 user
    async fn ask(&self, system: &str, prompt: &str) -> Result<String, String> {
        let messages = [Message::system(system), Message::user(prompt)];
        self.complete(&messages).await
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
