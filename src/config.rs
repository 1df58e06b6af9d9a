//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TASKHOOK__*` 覆盖（双下划线表示嵌套，如 `TASKHOOK__LLM__PROVIDER=deepseek`）。
//! 配置在进程启动时构造一次，按引用注入 Planner / 工具 / 服务，不存在模块级全局状态。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub notifier: NotifierSection,
}

/// [server] 段：监听地址、SQLite 路径、并发任务上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen_addr: String,
    pub db_path: PathBuf,
    /// 同时运行的任务数（任务内部步骤始终串行）
    pub max_concurrent_tasks: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            db_path: PathBuf::from("tasks.db"),
            max_concurrent_tasks: 4,
        }
    }
}

/// [llm] 段：后端选择、模型、凭据所在的环境变量名、单次请求超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek
    pub provider: String,
    /// 未设置时按 provider 取默认模型
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 存放 API Key 的环境变量名
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// [tools] 段：全局工具超时、代码生成默认语言、代码执行与网页摘要子配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用的外层超时（秒）
    pub tool_timeout_secs: u64,
    pub code_language: String,
    pub code_execution: CodeExecutionSection,
    pub web_scraper: WebScraperSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 180,
            code_language: "python".to_string(),
            code_execution: CodeExecutionSection::default(),
            web_scraper: WebScraperSection::default(),
        }
    }
}

/// [tools.code_execution] 段：解释器、执行上限、临时脚本目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CodeExecutionSection {
    pub interpreter: String,
    pub timeout_secs: u64,
    /// 未设置时使用系统临时目录
    pub scratch_dir: Option<PathBuf>,
    /// 临时脚本扩展名；未设置时按 tools.code_language 推断
    pub extension: Option<String>,
}

impl Default for CodeExecutionSection {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: 10,
            scratch_dir: None,
            extension: None,
        }
    }
}

/// [tools.web_scraper] 段：固定来源列表、抓取超时、单来源最大字符数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebScraperSection {
    pub sources: Vec<String>,
    pub timeout_secs: u64,
    pub max_result_chars: usize,
}

impl Default for WebScraperSection {
    fn default() -> Self {
        Self {
            sources: vec![
                "https://en.wikipedia.org/wiki/Special:Random".into(),
                "https://news.ycombinator.com/".into(),
            ],
            timeout_secs: 15,
            max_result_chars: 8000,
        }
    }
}

/// [notifier] 段：回调 POST 超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierSection {
    pub timeout_secs: u64,
}

impl Default for NotifierSection {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// 启动时解析的凭据；api_key 为 None 表示任务会直接失败
#[derive(Clone, Default)]
pub struct Credentials {
    /// 读取自哪个环境变量（用于错误提示）
    pub api_key_env: String,
    pub api_key: Option<String>,
}

impl Credentials {
    /// 从 `llm.api_key_env` 指定的环境变量读取，空字符串视为未设置
    pub fn from_env(llm: &LlmSection) -> Self {
        let api_key = std::env::var(&llm.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty());
        Self {
            api_key_env: llm.api_key_env.clone(),
            api_key,
        }
    }

    pub fn with_key(api_key_env: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_key_env: api_key_env.into(),
            api_key,
        }
    }

    pub fn is_present(&self) -> bool {
        self.api_key.is_some()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key_env", &self.api_key_env)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// 从 config 目录加载配置，环境变量 TASKHOOK__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TASKHOOK__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TASKHOOK")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
