//! Taskhook - Rust 任务 Webhook 服务
//!
//! 接收自然语言任务描述，由 LLM 生成分步计划，按顺序调用工具执行，
//! 持久化任务状态，并在完成后回调通知。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）与凭据
//! - **core**: 执行上下文、错误类型、计划-执行编排器
//! - **gateway**: HTTP 入口、后台任务队列、回调通知
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: 日志初始化
//! - **plan**: 计划数据结构与 LLM 规划器
//! - **store**: 任务记录存储（SQLite / 内存）
//! - **tools**: 工具箱（代码生成、代码执行、内容生成、网页摘要、数据分析、确认）与执行器

pub mod config;
pub mod core;
pub mod gateway;
pub mod llm;
pub mod observability;
pub mod plan;
pub mod store;
pub mod tools;
