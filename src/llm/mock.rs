//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预置回复；预置耗尽后回显最后一条 User 消息。记录调用次数与收到的 prompt，
//! 便于断言「缺少凭据时 Planner 零调用」等行为。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：脚本化回复 + 调用计数
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    structured: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定回复
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::default();
        for reply in replies {
            mock.push_reply(Ok(reply.into()));
        }
        mock
    }

    /// 追加一条回复（Err 模拟后端失败）
    pub fn push_reply(&self, reply: Result<String, String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 结构化请求使用过的 schema 名称
    pub fn structured_requests(&self) -> Vec<String> {
        self.structured.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// 每次调用收到的最后一条 User 消息
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "(no input)".to_string());

        if let Ok(mut p) = self.prompts.lock() {
            p.push(last_user.clone());
        }

        let scripted = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match scripted {
            Some(reply) => reply,
            None => Ok(format!("Echo from Mock: {}", last_user)),
        }
    }

    async fn complete_structured(
        &self,
        messages: &[Message],
        schema_name: &str,
        _schema: &serde_json::Value,
    ) -> Result<String, String> {
        if let Ok(mut s) = self.structured.lock() {
            s.push(schema_name.to_string());
        }
        self.complete(messages).await
    }
}
