//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::{AppConfig, Credentials};

pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use traits::LlmClient;

/// 按配置创建 LLM 客户端；无 API Key 时退回 Mock（任务在规划前即以 CredentialMissing 失败，不会真正调用）
pub fn create_llm_from_config(cfg: &AppConfig, credentials: &Credentials) -> Arc<dyn LlmClient> {
    let Some(api_key) = credentials.api_key.as_deref() else {
        tracing::warn!(
            env = %cfg.llm.api_key_env,
            "No API key set, using Mock LLM; submitted tasks will fail"
        );
        return Arc::new(MockLlmClient::new());
    };
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.request_timeout_secs;

    if provider == "deepseek" {
        let model = cfg.llm.model.clone().unwrap_or_else(|| DEEPSEEK_CHAT.to_string());
        let base = cfg.llm.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(OpenAiClient::new(Some(base), &model, api_key, timeout).with_json_schema(false))
    } else {
        if provider != "openai" {
            tracing::warn!(provider = %provider, "Unknown LLM provider, falling back to OpenAI-compatible client");
        }
        let model = cfg.llm.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &model,
            api_key,
            timeout,
        ))
    }
}
