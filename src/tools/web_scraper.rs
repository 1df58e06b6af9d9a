//! 网页摘要工具：抓取配置中的固定来源，按步骤目标让模型做摘要
//!
//! 来源列表由配置决定（步骤描述只作为「目标」）；GET 请求带超时与 User-Agent；
//! HTML 响应用 html2text 提取可读文本，超过 max_result_chars 时截断并追加 ...[truncated]。
//! 单个来源抓取失败会在摘要材料中注明，全部失败时返回错误。

use std::sync::Arc;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;

use crate::llm::LlmClient;
use crate::plan::ToolKind;
use crate::tools::{Tool, ToolInput};

const SYSTEM_INSTRUCTION: &str = "You are a research assistant. Summarise the collected web material \
with respect to the stated objective. Cite which source each point comes from. Be concise.";

pub struct WebScraperTool {
    client: Client,
    llm: Arc<dyn LlmClient>,
    sources: Vec<String>,
    max_result_chars: usize,
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.to_ascii_lowercase().starts_with("<html")
        || (s.contains('<') && (s.contains("</") || s.contains("<head") || s.contains("<title")))
}

fn truncate_chars(body: String, max: usize) -> String {
    if body.chars().count() > max {
        body.chars().take(max).collect::<String>() + "\n...[truncated]"
    } else {
        body
    }
}

impl WebScraperTool {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        sources: Vec<String>,
        timeout_secs: u64,
        max_result_chars: usize,
    ) -> Self {
        const USER_AGENT: &str = concat!("taskhook/", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            llm,
            sources,
            max_result_chars,
        }
    }

    fn html_to_text(html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| format!("Read body: {}", e))?;
        let body = body.trim_start_matches('\u{FEFF}');

        let text = if looks_like_html(body) {
            Self::html_to_text(body)
        } else {
            body.to_string()
        };
        Ok(truncate_chars(text, self.max_result_chars))
    }

    /// 抓取全部来源，返回拼好的摘要材料；全部失败时返回 Err
    async fn collect(&self) -> Result<String, String> {
        if self.sources.is_empty() {
            return Err("No web sources configured".to_string());
        }
        let mut sections = Vec::with_capacity(self.sources.len());
        let mut failures = 0;
        for url in &self.sources {
            match self.fetch(url).await {
                Ok(text) => sections.push(format!("## Source: {}\n{}", url, text)),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(url = %url, error = %e, "web source fetch failed");
                    sections.push(format!("## Source: {}\n(unavailable: {})", url, e));
                }
            }
        }
        if failures == self.sources.len() {
            return Err(format!("All {} web sources failed:\n{}", failures, sections.join("\n")));
        }
        Ok(sections.join("\n\n"))
    }
}

#[async_trait]
impl Tool for WebScraperTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WebScraper
    }

    fn description(&self) -> &str {
        "Collect text from the configured web sources and summarise it for an objective."
    }

    async fn invoke(&self, input: &ToolInput) -> Result<String, String> {
        let material = self.collect().await?;
        let prompt = format!(
            "Objective: {}\n\nCollected material:\n{}",
            input.instruction, material
        );
        self.llm
            .ask(SYSTEM_INSTRUCTION, &prompt)
            .await
            .map_err(|e| format!("Web summary error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_html_helpers() {
        assert!(looks_like_html("<!DOCTYPE html><html></html>"));
        assert!(!looks_like_html("plain text"));
        assert_eq!(strip_html_tags("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(truncate_chars("abcdef".into(), 3), "abc\n...[truncated]");
        assert_eq!(truncate_chars("abc".into(), 3), "abc");
    }

    #[tokio::test]
    async fn test_no_sources_is_error() {
        let llm = Arc::new(MockLlmClient::new());
        let tool = WebScraperTool::new(llm.clone(), vec![], 1, 100);
        let err = tool.invoke(&ToolInput::new("objective", "")).await.unwrap_err();
        assert!(err.contains("No web sources"));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_sources_skip_summary() {
        let llm = Arc::new(MockLlmClient::new());
        // 端口 9 (discard) 在本地通常拒绝连接
        let tool = WebScraperTool::new(llm.clone(), vec!["http://127.0.0.1:9/".into()], 1, 100);
        let err = tool.invoke(&ToolInput::new("objective", "")).await.unwrap_err();
        assert!(err.contains("All 1 web sources failed"));
        assert_eq!(llm.calls(), 0);
    }
}
