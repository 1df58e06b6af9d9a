//! 代码执行工具：把上一步生成的源码写入临时脚本并用解释器运行
//!
//! - 执行上限固定（默认 10 秒），超时即杀掉子进程并返回超时信息
//! - 临时脚本在任何退出路径上都会被删除（TempPath 析构 + 显式 close）
//! - 输出格式：`STDOUT:\n...`，有 stderr 时追加 `STDERR:\n...`，非零退出时追加退出码

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::plan::ToolKind;
use crate::tools::{Tool, ToolInput};

/// 按代码语言推断脚本扩展名；未知语言直接用语言名
pub fn script_extension(language: &str) -> String {
    let language = language.trim().to_ascii_lowercase();
    let ext = match language.as_str() {
        "python" | "python3" => "py",
        "javascript" | "node" | "nodejs" => "js",
        "typescript" => "ts",
        "ruby" => "rb",
        "perl" => "pl",
        "bash" | "shell" | "sh" => "sh",
        other => other,
    };
    ext.to_string()
}

pub struct CodeExecutionTool {
    interpreter: String,
    timeout: Duration,
    scratch_dir: Option<PathBuf>,
    extension: String,
}

impl CodeExecutionTool {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
            scratch_dir: None,
            extension: "py".to_string(),
        }
    }

    /// 临时脚本所在目录（默认系统临时目录）
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// 运行源码；超时返回 Ok(超时信息)，无法落盘或启动解释器时返回 Err
    pub async fn run_source(&self, source: &str) -> Result<String, String> {
        if source.trim().is_empty() {
            return Err("No code to execute".to_string());
        }

        let suffix = format!(".{}", self.extension);
        let mut builder = tempfile::Builder::new();
        builder.prefix("taskhook-").suffix(&suffix);
        let mut file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| format!("Cannot create temp script: {}", e))?;

        file.write_all(source.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| format!("Cannot write temp script: {}", e))?;
        // 关闭句柄但保留路径，TempPath 析构时删除文件
        let script = file.into_temp_path();

        let outcome = self.spawn_and_wait(&script).await;

        let script_path = script.to_path_buf();
        if let Err(e) = script.close() {
            tracing::warn!(path = %script_path.display(), error = %e, "failed to remove temp script");
        }
        outcome
    }

    async fn spawn_and_wait(&self, script: &std::path::Path) -> Result<String, String> {
        tracing::info!(interpreter = %self.interpreter, script = %script.display(), "executing code");

        let child = Command::new(&self.interpreter)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to start {}: {}", self.interpreter, e))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs_f64(), "code execution timed out");
                Ok(format!(
                    "Execution timed out after {}s and was aborted",
                    self.timeout.as_secs_f64()
                ))
            }
            Ok(Err(e)) => Err(format!("Execution failed: {}", e)),
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let mut text = format!("STDOUT:\n{}", stdout);
                if !stderr.trim().is_empty() {
                    text.push_str(&format!("\nSTDERR:\n{}", stderr));
                }
                if !output.status.success() {
                    let code = output
                        .status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string());
                    text.push_str(&format!("\nEXIT CODE: {}", code));
                }
                Ok(text)
            }
        }
    }
}

#[async_trait]
impl Tool for CodeExecutionTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CodeExecution
    }

    fn description(&self) -> &str {
        "Execute the source code produced by the previous code_generator step."
    }

    async fn invoke(&self, input: &ToolInput) -> Result<String, String> {
        self.run_source(&input.instruction).await
    }
}
