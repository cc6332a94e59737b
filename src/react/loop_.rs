//! 工具调用主循环
//!
//! Plan -> Act (Tool) -> Observe -> 下一轮 Plan；显式步数计数，超过上限即失败。
//! 每轮模型输出以流式方式回调 on_chunk，工具在两轮输出之间同步执行。

use crate::core::AgentError;
use crate::llm::{generate_stream, LlmClient};
use crate::memory::Message;
use crate::react::planner::{parse_llm_output, repair_prompt, PlannerOutput};
use crate::tools::{tool_call_schema_json, ToolExecutor};

/// Observation 回灌给模型的最大字符数
const OBSERVATION_MAX_CHARS: usize = 12_000;

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub response: String,
    pub steps: usize,
    /// 按调用顺序记录 (工具名, status)
    pub tool_calls: Vec<(String, String)>,
}

/// base prompt + 工具 schema + 调用格式
pub fn tool_system_prompt(base: &str, executor: &ToolExecutor) -> String {
    format!(
        "{base}\n\n## Available tools\n{}\n\n## Tool call format\n\
         To use a tool reply with only one JSON object matching this schema:\n{}\n\
         Each tool result comes back as an observation. \
         When the task is complete reply with a short plain-text summary of what you changed.",
        executor.schema_json(),
        tool_call_schema_json()
    )
}

pub async fn run_tool_loop(
    llm: &dyn LlmClient,
    executor: &ToolExecutor,
    system_prompt: &str,
    user_prompt: &str,
    max_steps: usize,
    on_chunk: &mut (dyn FnMut(&str) + Send),
) -> Result<LoopOutcome, AgentError> {
    let mut messages = vec![
        Message::system(tool_system_prompt(system_prompt, executor)),
        Message::user(user_prompt),
    ];
    let mut tool_calls = Vec::new();

    for step in 1..=max_steps {
        let output = generate_stream(llm, &messages, on_chunk).await?;
        tracing::debug!(step, llm = llm.name(), chars = output.len(), "tool loop step");

        match parse_llm_output(&output) {
            Ok(PlannerOutput::Response(response)) => {
                return Ok(LoopOutcome {
                    response,
                    steps: step,
                    tool_calls,
                });
            }
            Ok(PlannerOutput::ToolCall(call)) => {
                messages.push(Message::assistant(output));
                if !executor.has_tool(&call.tool) {
                    tracing::warn!(tool = %call.tool, "model requested unknown tool");
                    messages.push(Message::user(repair_prompt(
                        &format!("tool '{}' does not exist", call.tool),
                        &executor.tool_names(),
                    )));
                    continue;
                }
                let result = executor.execute(&call.tool, call.args).await;
                tool_calls.push((call.tool.clone(), result.status().to_string()));
                let observation: String = result.to_json().chars().take(OBSERVATION_MAX_CHARS).collect();
                messages.push(Message::user(format!(
                    "Observation from {}: {}",
                    call.tool, observation
                )));
            }
            Err(e) => {
                tracing::debug!(error = %e, "unparseable tool call");
                messages.push(Message::assistant(output));
                messages.push(Message::user(repair_prompt(
                    &e.to_string(),
                    &executor.tool_names(),
                )));
            }
        }
    }

    Err(AgentError::Execution(format!(
        "tool loop reached the {max_steps}-step limit without a final answer"
    )))
}
