//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找。
//! 工具内部错误一律转成 ToolOutput，不越过工具边界抛出。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::{AgentError, FieldError};

/// 工具结果：以 `status` 为判别字段序列化回 LLM
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutput {
    Success {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<FieldError>,
    },
    /// 用户拒绝审批，不是错误
    Canceled { message: String },
}

impl ToolOutput {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: Value) -> Self {
        Self::Success {
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::Canceled {
            message: message.into(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
            Self::Canceled { .. } => "canceled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"status\":\"error\",\"message\":\"{e}\"}}"))
    }
}

impl From<AgentError> for ToolOutput {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Validation { tool, errors } => Self::Error {
                message: format!("Invalid arguments for tool '{tool}'"),
                errors,
            },
            other => Self::error(other.to_string()),
        }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> ToolOutput;
}

/// 按名称存储 Arc<dyn Tool>；BTreeMap 保证 schema 输出顺序稳定
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn execute(&self, name: &str, args: Value) -> ToolOutput {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => ToolOutput::error(format!(
                "Unknown tool: {name}. Available: {}",
                self.tool_names().join(", ")
            )),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// [{name, description, parameters}]，拼入 system prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }
        fn description(&self) -> &str {
            "Uppercase text"
        }
        async fn execute(&self, args: Value) -> ToolOutput {
            match args.get("text").and_then(|v| v.as_str()) {
                Some(t) => ToolOutput::success(t.to_uppercase()),
                None => ToolOutput::error("missing text"),
            }
        }
    }

    #[test]
    fn test_output_serializes_with_status() {
        let ok: Value = serde_json::from_str(&ToolOutput::success("done").to_json()).unwrap();
        assert_eq!(ok["status"], "success");
        assert_eq!(ok["message"], "done");

        let canceled: Value = serde_json::from_str(&ToolOutput::canceled("no").to_json()).unwrap();
        assert_eq!(canceled["status"], "canceled");

        let invalid: ToolOutput = AgentError::Validation {
            tool: "edit_file".into(),
            errors: vec![FieldError::new("path", "required")],
        }
        .into();
        let v: Value = serde_json::from_str(&invalid.to_json()).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["errors"][0]["field"], "path");
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(Upper);
        assert_eq!(
            registry.execute("upper", serde_json::json!({"text": "hi"})).await,
            ToolOutput::success("HI")
        );
        let unknown = registry.execute("nope", Value::Null).await;
        assert_eq!(unknown.status(), "error");
        assert!(registry.to_schema_json().contains("\"upper\""));
    }
}
