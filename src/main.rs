//! hive 入口：初始化日志、加载配置、选择可用 LLM，并运行交互式会话
//!
//! 用法：`hive [--config <path>] [request...]`，其余参数拼接为首个请求。

use std::path::PathBuf;

use anyhow::Context;
use hive::config::{load_config, AppConfig};
use hive::core::{AgentError, SessionController};
use hive::llm::{ProviderFactory, ProviderSelection};
use hive::tools::approval_for_mode;
use hive::ui::ConsoleIo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    let (config_path, request) = parse_args(std::env::args().skip(1));
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            AppConfig::default()
        }
    };

    let factory = ProviderFactory::with_defaults();
    let selection = ProviderSelection::from_config(&config.llm);
    let default = match factory.get_best_llm(&config.llm, &selection).await {
        Ok(client) => client,
        Err(e @ AgentError::NoLlmAvailable(_)) => {
            eprintln!("{e}");
            eprintln!("Configure a provider in config/default.toml or set its API key, then retry.");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to select an LLM provider"),
    };
    tracing::info!(provider = %default.name(), "using LLM provider");
    let handle = factory.build_handle(&config.llm, default).await;

    let approval = approval_for_mode(config.approval.mode);
    let mut controller =
        SessionController::new(config, Some(handle), approval, Box::new(ConsoleIo::new()))
            .context("Failed to start session")?;
    if let Some(request) = request {
        controller = controller.with_initial_prompt(request);
    }
    controller.run().await;
    Ok(())
}

fn parse_args(args: impl Iterator<Item = String>) -> (Option<PathBuf>, Option<String>) {
    let mut config_path = None;
    let mut words = Vec::new();
    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => config_path = args.next().map(PathBuf::from),
            _ => words.push(arg),
        }
    }
    let request = (!words.is_empty()).then(|| words.join(" "));
    (config_path, request)
}
