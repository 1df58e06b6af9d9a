//! 工具注册表
//!
//! 所有工具实现 Tool trait（kind / description / invoke），由 ToolRegistry 按工具名注册与查找，
//! ToolExecutor 在调用时加超时并把失败统一转成结果字符串。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::plan::ToolKind;

/// 一次工具调用的输入：instruction 为主指令，context 为上一步结果（已渲染）
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInput {
    pub instruction: String,
    pub context: String,
}

impl ToolInput {
    pub fn new(instruction: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            context: context.into(),
        }
    }
}

/// 工具 trait：类型、描述、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具类型（决定注册名）
    fn kind(&self) -> ToolKind;

    /// 工具描述
    fn description(&self) -> &str;

    /// 执行工具；Err 为人类可读的失败描述
    async fn invoke(&self, input: &ToolInput) -> Result<String, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同类型的旧工具被替换
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.kind().as_str().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, kind: &ToolKind) -> Option<Arc<dyn Tool>> {
        self.tools.get(kind.as_str()).cloned()
    }

    /// 返回 (name, description) 列表
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        let mut list: Vec<(String, String)> = self
            .tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect();
        list.sort();
        list
    }
}
