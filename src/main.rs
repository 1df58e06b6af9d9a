//! Taskhook - 任务 Webhook 服务
//!
//! 入口：初始化日志与配置，组装存储 / LLM / 工具 / 编排器，恢复未完成任务，
//! 启动后台执行器与 HTTP 服务，Ctrl+C 时优雅退出。

use std::sync::Arc;

use anyhow::Context;
use taskhook::{
    config::{load_config, Credentials},
    core::Orchestrator,
    gateway::{create_router, AppState, HttpNotifier, TaskRunner, TaskService, TaskWorker},
    llm::create_llm_from_config,
    observability,
    plan::Planner,
    store::{SqliteTaskStore, TaskStore},
    tools::{create_tool_registry, ToolExecutor},
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load configuration")?;

    let credentials = Credentials::from_env(&cfg.llm);
    if !credentials.is_present() {
        tracing::warn!(
            "{} is not set; submitted tasks will fail until it is configured",
            credentials.api_key_env
        );
    }

    let store: Arc<dyn TaskStore> = Arc::new(
        SqliteTaskStore::open(&cfg.server.db_path)
            .with_context(|| format!("Failed to open task store {}", cfg.server.db_path.display()))?,
    );

    let llm = create_llm_from_config(&cfg, &credentials);
    let registry = create_tool_registry(&cfg, Arc::clone(&llm));
    let executor = Arc::new(ToolExecutor::new(registry, cfg.tools.tool_timeout_secs));
    for (name, description) in executor.tool_descriptions() {
        tracing::info!(tool = %name, "registered: {}", description);
    }
    let planner = Arc::new(Planner::new(Arc::clone(&llm)));
    let orchestrator = Arc::new(Orchestrator::new(planner, executor));

    let notifier = Arc::new(HttpNotifier::new(cfg.notifier.timeout_secs));
    let runner = Arc::new(TaskRunner::new(
        orchestrator,
        Arc::clone(&store),
        notifier,
        credentials,
    ));

    let (service, queue_rx) = TaskService::new(Arc::clone(&store));
    service
        .recover()
        .await
        .context("Failed to recover unfinished tasks")?;

    let worker = TaskWorker::new(runner, Arc::clone(&store), cfg.server.max_concurrent_tasks);
    tokio::spawn(worker.start(queue_rx));

    let app = create_router(Arc::new(AppState { service }));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
            signal_token.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(&cfg.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.listen_addr))?;
    tracing::info!("Taskhook listening on http://{}", cfg.server.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server error")?;

    tracing::info!("Taskhook stopped");
    Ok(())
}
