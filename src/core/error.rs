//! Agent 错误类型
//!
//! 与 RecoveryEngine 配合：状态处理失败时按错误与所在状态降级到安全的下一状态。
//! 审批被拒绝不是错误，对应工具结果中的 `canceled`。

use serde::Serialize;
use thiserror::Error;

use crate::llm::LlmError;

/// 工具参数校验失败时的单字段错误（序列化回 LLM 以便自我修复）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// 运行过程中可能出现的错误（配置、可用性、参数校验、路径逃逸、内容不匹配、执行失败等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// Provider 未配置或已禁用
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider 不可达
    #[error("Provider unavailable: {0}")]
    Availability(String),

    /// 启动期致命：没有任何可用的 LLM
    #[error("No LLM available: {0}")]
    NoLlmAvailable(String),

    #[error("Invalid arguments for tool '{tool}': {}", format_field_errors(.errors))]
    Validation {
        tool: String,
        errors: Vec<FieldError>,
    },

    #[error("Path escapes sandbox root: {0}")]
    PathSandbox(String),

    #[error("Content mismatch in {path}: {detail}")]
    ContentMismatch { path: String, detail: String },

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Invalid plan: {0}")]
    PlanValidation(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_fields() {
        let err = AgentError::Validation {
            tool: "edit_file".to_string(),
            errors: vec![
                FieldError::new("path", "required"),
                FieldError::new("start_line", "must be >= 1"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("edit_file"));
        assert!(text.contains("path: required"));
        assert!(text.contains("start_line: must be >= 1"));
    }
}
