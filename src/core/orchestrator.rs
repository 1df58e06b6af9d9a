//! 计划-执行主循环
//!
//! run：IN_PROGRESS → 规划（一次）→ 按 step_id 顺序逐步调用工具，并把上一步结果作为上下文传入下一步
//! → COMPLETED（result 为最后的上下文）。循环中逃逸的任何错误都在 run 顶层捕获并写入 FAILED，
//! 记录不会停留在 IN_PROGRESS。

use std::sync::Arc;

use crate::core::{ExecutionContext, TaskError};
use crate::plan::{Step, TaskPlanner, ToolKind};
use crate::store::{TaskStatus, TaskStore};
use crate::tools::{ToolExecutor, ToolInput};

/// 编排器：Planner + ToolExecutor，可被多个任务共享（每次 run 的上下文互不相干）
pub struct Orchestrator {
    planner: Arc<dyn TaskPlanner>,
    tools: Arc<ToolExecutor>,
}

impl Orchestrator {
    pub fn new(planner: Arc<dyn TaskPlanner>, tools: Arc<ToolExecutor>) -> Self {
        Self { planner, tools }
    }

    /// 运行一个任务直到终态；成功返回最终结果文本
    pub async fn run(
        &self,
        task_id: &str,
        goal: &str,
        store: &dyn TaskStore,
    ) -> Result<String, TaskError> {
        match self.run_plan(task_id, goal, store).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "task orchestration failed");
                mark_failed(store, task_id, &e).await;
                Err(e)
            }
        }
    }

    async fn run_plan(
        &self,
        task_id: &str,
        goal: &str,
        store: &dyn TaskStore,
    ) -> Result<String, TaskError> {
        store
            .update_status(task_id, TaskStatus::InProgress, None)
            .await?;

        let plan = self.planner.create_plan(goal).await;
        tracing::info!(task_id = %task_id, goal = %plan.goal, steps = plan.steps.len(), "plan ready");
        for step in &plan.steps {
            tracing::debug!(
                task_id = %task_id,
                step_id = step.step_id,
                tool = %step.tool_required,
                "  [{}] {}",
                step.step_id,
                step.description
            );
        }

        let mut context = ExecutionContext::initial();
        for step in &plan.steps {
            tracing::info!(task_id = %task_id, step_id = step.step_id, tool = %step.tool_required, "executing step");
            let output = self.execute_step(step, &context).await;
            tracing::debug!(task_id = %task_id, step_id = step.step_id, output = %output, "step finished");
            context = ExecutionContext::after(step, output);
        }

        let result = context.to_string();
        store
            .update_status(task_id, TaskStatus::Completed, Some(&result))
            .await?;
        // 进程级累计值（规划与工具共用同一后端）
        let (prompt_tokens, completion_tokens, total_tokens) = self.planner.token_usage();
        tracing::info!(
            task_id = %task_id,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "task completed"
        );
        Ok(result)
    }

    /// 按工具类型组装输入并调用；返回值总是步骤结果文本
    pub async fn execute_step(&self, step: &Step, context: &ExecutionContext) -> String {
        let input = match &step.tool_required {
            ToolKind::CodeExecution => {
                // 载荷是上一步生成的源码，而不是步骤描述
                if context.tool() != Some(&ToolKind::CodeGenerator) {
                    return format!(
                        "code_execution skipped: step {} must directly follow a code_generator step",
                        step.step_id
                    );
                }
                ToolInput::new(context.output(), context.to_string())
            }
            // 数据集是上一步的原始输出，不带「Result of step N」前缀（否则步骤编号会被当成数据）
            ToolKind::DataAnalyzer => ToolInput::new(step.description.clone(), context.output()),
            ToolKind::CodeGenerator
            | ToolKind::ContentGenerator
            | ToolKind::WebScraper
            | ToolKind::None => ToolInput::new(step.description.clone(), context.to_string()),
            ToolKind::Unsupported(name) => return format!("unsupported tool: {}", name),
        };
        self.tools.invoke(&step.tool_required, input).await
    }
}

/// 尽力写入 FAILED；存储本身不可用时只能记日志
pub(crate) async fn mark_failed(store: &dyn TaskStore, task_id: &str, error: &TaskError) {
    let diagnostic = error.diagnostic();
    if let Err(store_err) = store
        .update_status(task_id, TaskStatus::Failed, Some(&diagnostic))
        .await
    {
        tracing::error!(
            task_id = %task_id,
            error = %store_err,
            "could not record FAILED status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::core::NO_PRIOR_RESULT;
    use crate::plan::Plan;
    use crate::store::{InMemoryTaskStore, StoreError, TaskRecord};
    use crate::tools::{Tool, ToolRegistry};

    struct FixedPlanner(Plan);

    #[async_trait]
    impl TaskPlanner for FixedPlanner {
        async fn create_plan(&self, _goal: &str) -> Plan {
            self.0.clone()
        }
    }

    type CallLog = Arc<Mutex<Vec<(ToolKind, ToolInput)>>>;

    /// 记录调用并按顺序返回预置输出
    struct RecordingTool {
        kind: ToolKind,
        log: CallLog,
        outputs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn kind(&self) -> ToolKind {
            self.kind.clone()
        }
        fn description(&self) -> &str {
            "recording"
        }
        async fn invoke(&self, input: &ToolInput) -> Result<String, String> {
            self.log.lock().unwrap().push((self.kind.clone(), input.clone()));
            let mut outputs = self.outputs.lock().unwrap();
            if outputs.is_empty() {
                Ok(format!("{} done", self.kind))
            } else {
                Ok(outputs.remove(0))
            }
        }
    }

    fn orchestrator(plan: Plan, outputs: &[(ToolKind, &str)]) -> (Orchestrator, CallLog) {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        for kind in ToolKind::KNOWN.iter() {
            let scripted = outputs
                .iter()
                .filter(|(k, _)| k == kind)
                .map(|(_, o)| o.to_string())
                .collect();
            registry.register(RecordingTool {
                kind: kind.clone(),
                log: log.clone(),
                outputs: Mutex::new(scripted),
            });
        }
        let tools = Arc::new(ToolExecutor::new(registry, 5));
        (Orchestrator::new(Arc::new(FixedPlanner(plan)), tools), log)
    }

    #[tokio::test]
    async fn test_steps_run_in_order_and_complete() {
        let plan = Plan::new(
            "report",
            vec![
                Step::new(1, "collect sources", "web_scraper"),
                Step::new(2, "analyse", "data_analyzer"),
                Step::new(3, "write it up", "content_generator"),
            ],
        );
        let (orch, log) = orchestrator(plan, &[]);
        let store = InMemoryTaskStore::new();
        store.create("t1", "report", None).await.unwrap();

        let result = orch.run("t1", "report", &store).await.unwrap();

        let calls = log.lock().unwrap();
        let order: Vec<ToolKind> = calls.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(
            order,
            vec![ToolKind::WebScraper, ToolKind::DataAnalyzer, ToolKind::ContentGenerator]
        );
        // 第一步看到哨兵，之后每步看到上一步结果
        assert_eq!(calls[0].1.context, NO_PRIOR_RESULT);
        assert_eq!(calls[1].1.context, "web_scraper done");
        assert_eq!(calls[2].1.context, "Result of step 2: data_analyzer done");
        assert_eq!(calls[2].1.instruction, "write it up");

        assert_eq!(result, "Result of step 3: content_generator done");
        let record = store.get("t1").await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.result.as_deref(), Some(result.as_str()));
    }

    #[tokio::test]
    async fn test_code_execution_payload_is_context() {
        let plan = Plan::new(
            "hello",
            vec![
                Step::new(1, "write hello world", "code_generator"),
                Step::new(2, "run the script", "code_execution"),
            ],
        );
        let (orch, log) = orchestrator(
            plan,
            &[
                (ToolKind::CodeGenerator, "print('hi')"),
                (ToolKind::CodeExecution, "STDOUT:\nhi\n"),
            ],
        );
        let store = InMemoryTaskStore::new();
        store.create("t", "hello", None).await.unwrap();

        let result = orch.run("t", "hello", &store).await.unwrap();

        let calls = log.lock().unwrap();
        assert_eq!(calls[1].0, ToolKind::CodeExecution);
        assert_eq!(calls[1].1.instruction, "print('hi')");
        assert_ne!(calls[1].1.instruction, "run the script");
        assert!(result.contains("STDOUT:\nhi\n"));
    }

    #[tokio::test]
    async fn test_data_analyzer_ignores_step_number() {
        let mut registry = ToolRegistry::new();
        registry.register(crate::tools::DataAnalyzerTool::new());
        let tools = Arc::new(ToolExecutor::new(registry, 5));
        let orch = Orchestrator::new(Arc::new(FixedPlanner(Plan::new("g", vec![]))), tools);

        let previous = Step::new(7, "collect sales", "web_scraper");
        let context = ExecutionContext::after(&previous, "sales: 10, 20".to_string());
        let step = Step::new(8, "find the range", "data_analyzer");

        let report = orch.execute_step(&step, &context).await;
        assert!(report.contains("2 numeric values"), "report was {:?}", report);
        assert!(report.contains("min=10 max=20 mean=15.00"));
    }

    #[tokio::test]
    async fn test_code_execution_without_generator_is_skipped() {
        let plan = Plan::new("g", vec![Step::new(1, "run something", "code_execution")]);
        let (orch, log) = orchestrator(plan, &[]);
        let store = InMemoryTaskStore::new();
        store.create("t", "g", None).await.unwrap();

        let result = orch.run("t", "g", &store).await.unwrap();
        assert!(result.contains("code_execution skipped"));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(
            store.get("t").await.unwrap().unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_unsupported_tool_does_not_abort() {
        let plan = Plan::new(
            "g",
            vec![
                Step::new(1, "edit image", "image_editor"),
                Step::new(2, "summarise", "none"),
            ],
        );
        let (orch, log) = orchestrator(plan, &[]);
        let store = InMemoryTaskStore::new();
        store.create("t", "g", None).await.unwrap();

        let result = orch.run("t", "g", &store).await.unwrap();
        let calls = log.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.context, "Result of step 1: unsupported tool: image_editor");
        assert_eq!(result, "Result of step 2: none done");
    }

    #[tokio::test]
    async fn test_blank_tool_is_not_confirmed() {
        let plan = Plan::new("g", vec![Step::new(1, "do it", "")]);
        let (orch, log) = orchestrator(plan, &[]);
        let store = InMemoryTaskStore::new();
        store.create("t", "g", None).await.unwrap();

        let result = orch.run("t", "g", &store).await.unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(result, "Result of step 1: unsupported tool: ");
    }

    #[tokio::test]
    async fn test_degraded_plan_still_terminates() {
        let (orch, _log) = orchestrator(Plan::degraded("g", "bad JSON"), &[]);
        let store = InMemoryTaskStore::new();
        store.create("t", "g", None).await.unwrap();

        orch.run("t", "g", &store).await.unwrap();
        let record = store.get("t").await.unwrap().unwrap();
        assert!(record.status.is_terminal());
    }

    /// 完成写入时「不可达」的存储
    struct CompletionFailsStore(InMemoryTaskStore);

    #[async_trait]
    impl TaskStore for CompletionFailsStore {
        async fn create(
            &self,
            id: &str,
            description: &str,
            callback_url: Option<&str>,
        ) -> Result<TaskRecord, StoreError> {
            self.0.create(id, description, callback_url).await
        }
        async fn update_status(
            &self,
            id: &str,
            status: TaskStatus,
            result: Option<&str>,
        ) -> Result<TaskRecord, StoreError> {
            if status == TaskStatus::Completed {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.0.update_status(id, status, result).await
        }
        async fn get(&self, id: &str) -> Result<Option<TaskRecord>, StoreError> {
            self.0.get(id).await
        }
        async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, StoreError> {
            self.0.list_by_status(status).await
        }
    }

    #[tokio::test]
    async fn test_store_fault_marks_failed() {
        let plan = Plan::new("g", vec![Step::new(1, "x", "none")]);
        let (orch, _log) = orchestrator(plan, &[]);
        let store = CompletionFailsStore(InMemoryTaskStore::new());
        store.create("t", "g", None).await.unwrap();

        let err = orch.run("t", "g", &store).await.unwrap_err();
        assert!(matches!(err, TaskError::Store(_)));

        let record = store.get("t").await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.result.unwrap().contains("disk full"));
    }
}
