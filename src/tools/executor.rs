//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 在超时内调用 registry.execute，
//! 超时转为 error 结果；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{ToolOutput, ToolRegistry};

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；结果总是 ToolOutput，超时也折叠为 error
    pub async fn execute(&self, tool_name: &str, args: serde_json::Value) -> ToolOutput {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let output = match timeout(self.timeout, self.registry.execute(tool_name, args)).await {
            Ok(output) => output,
            Err(_) => AgentError::ToolTimeout(format!(
                "{tool_name} exceeded {}s",
                self.timeout.as_secs()
            ))
            .into(),
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": output.is_success(),
            "outcome": output.status(),
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");
        output
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn schema_json(&self) -> String {
        self.registry.to_schema_json()
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            "Sleeps"
        }
        async fn execute(&self, _args: Value) -> ToolOutput {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ToolOutput::success("woke")
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_output() {
        let mut registry = ToolRegistry::new();
        registry.register(Sleepy);
        let executor = ToolExecutor::new(registry, 1);
        let out = executor.execute("sleepy", Value::Null).await;
        match out {
            ToolOutput::Error { message, .. } => assert!(message.contains("sleepy")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = serde_json::json!({ "text": "x".repeat(500) });
        assert!(args_preview(&long).ends_with("..."));
        assert_eq!(args_preview(&serde_json::json!({})), "{}");
    }
}
