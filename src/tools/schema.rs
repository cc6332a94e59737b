//! 工具参数 Schema 与校验（schemars 生成参数 Schema）
//!
//! 参数结构体同时派生 Deserialize 与 JsonSchema：schema 注入 prompt，parse_args 按字段报告错误，
//! 让 LLM 依据 `errors` 自我修复。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::{AgentError, FieldError};

/// 工具调用请求格式：与 ReAct 解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 read_file、patch_file、run_process
    pub tool: String,
    /// 工具参数，依工具不同而不同
    pub args: HashMap<String, Value>,
}

pub fn tool_call_schema_json() -> String {
    serde_json::to_string_pretty(&schema_for!(ToolCallFormat)).unwrap_or_default()
}

/// 参数类型的 JSON Schema 值，供 Tool::parameters_schema 返回
pub fn schema_value<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

/// 先按 schema 检查必填字段，逐字段报告；再交给 serde 做类型校验
pub fn parse_args<T>(tool: &str, args: Value) -> Result<T, AgentError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = schema_for!(T);
    let Some(obj) = args.as_object() else {
        return Err(AgentError::Validation {
            tool: tool.to_string(),
            errors: vec![FieldError::new("args", "expected a JSON object")],
        });
    };

    let missing: Vec<FieldError> = schema
        .schema
        .object
        .as_ref()
        .map(|o| {
            o.required
                .iter()
                .filter(|field| obj.get(field.as_str()).map_or(true, Value::is_null))
                .map(|field| FieldError::new(field.clone(), "required field is missing"))
                .collect()
        })
        .unwrap_or_default();
    if !missing.is_empty() {
        return Err(AgentError::Validation {
            tool: tool.to_string(),
            errors: missing,
        });
    }

    serde_json::from_value(args).map_err(|e| AgentError::Validation {
        tool: tool.to_string(),
        errors: vec![FieldError::new(field_from_serde(&e.to_string()), e.to_string())],
    })
}

/// 从 serde 错误信息里取出字段名（`invalid type ... for field `x``），取不到就归到 args
fn field_from_serde(message: &str) -> String {
    message
        .split('`')
        .nth(1)
        .filter(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or("args")
        .to_string()
}
