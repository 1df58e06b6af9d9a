//! 工具层：统一的 Tool 接口、注册表、带超时与审计的执行器，以及五类内置工具 + `none` 确认

pub mod code_execution;
pub mod code_generator;
pub mod confirm;
pub mod content_generator;
pub mod data_analyzer;
pub mod executor;
pub mod registry;
pub mod web_scraper;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::llm::LlmClient;

pub use code_execution::{script_extension, CodeExecutionTool};
pub use code_generator::{strip_code_fence, CodeGeneratorTool};
pub use confirm::ConfirmTool;
pub use content_generator::ContentGeneratorTool;
pub use data_analyzer::DataAnalyzerTool;
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolInput, ToolRegistry};
pub use web_scraper::WebScraperTool;

/// 按配置注册全部内置工具
pub fn create_tool_registry(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(CodeGeneratorTool::new(llm.clone(), cfg.tools.code_language.clone()));

    let exec_cfg = &cfg.tools.code_execution;
    let extension = exec_cfg
        .extension
        .clone()
        .unwrap_or_else(|| script_extension(&cfg.tools.code_language));
    let mut code_exec = CodeExecutionTool::new(
        exec_cfg.interpreter.clone(),
        Duration::from_secs(exec_cfg.timeout_secs),
    )
    .with_extension(extension);
    if let Some(dir) = &exec_cfg.scratch_dir {
        code_exec = code_exec.with_scratch_dir(dir.clone());
    }
    tools.register(code_exec);

    tools.register(ContentGeneratorTool::new(llm.clone()));
    tools.register(WebScraperTool::new(
        llm.clone(),
        cfg.tools.web_scraper.sources.clone(),
        cfg.tools.web_scraper.timeout_secs,
        cfg.tools.web_scraper.max_result_chars,
    ));
    tools.register(DataAnalyzerTool::new());
    tools.register(ConfirmTool::new(llm));
    tools
}
