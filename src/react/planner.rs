//! Tool Call 解析
//!
//! 模型要么输出一个 `{"tool": "...", "args": {...}}` JSON 调用工具，要么输出普通文本作为最终答复。

use serde::{Deserialize, Serialize};

use crate::core::{AgentError, FieldError};
use crate::llm::extract_json;

/// LLM 返回的 Tool Call（{"tool": "read_file", "args": {"path": "..."}}）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone)]
pub enum PlannerOutput {
    /// 最终答复
    Response(String),
    ToolCall(ToolCall),
}

/// 含合法 ToolCall JSON 则为 ToolCall；JSON 不合法但明显想调用工具（含 "tool" 键）则报错让模型修复；
/// 其余都是 Response（答复里夹带代码花括号也算）
pub fn parse_llm_output(output: &str) -> Result<PlannerOutput, AgentError> {
    let trimmed = output.trim();
    let Some(json_str) = extract_json(trimmed) else {
        return Ok(PlannerOutput::Response(trimmed.to_string()));
    };

    match serde_json::from_str::<ToolCall>(json_str) {
        Ok(call) if !call.tool.trim().is_empty() => Ok(PlannerOutput::ToolCall(call)),
        Ok(_) => Ok(PlannerOutput::Response(trimmed.to_string())),
        Err(e) if json_str.contains("\"tool\"") => Err(AgentError::Validation {
            tool: "tool_call".to_string(),
            errors: vec![FieldError::new("json", e.to_string())],
        }),
        Err(_) => Ok(PlannerOutput::Response(trimmed.to_string())),
    }
}

/// 解析失败 / 调用未知工具时回灌给模型的修复提示
pub fn repair_prompt(problem: &str, tool_names: &[String]) -> String {
    format!(
        "Your previous reply could not be used: {problem}. \
         To call a tool, reply with exactly one JSON object of the form \
         {{\"tool\": \"<name>\", \"args\": {{...}}}} and nothing else. \
         Available tools: {}. When the work is done, reply with a plain-text summary.",
        tool_names.join(", ")
    )
}
