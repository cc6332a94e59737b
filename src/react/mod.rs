//! 认知层：Tool Call 解析与有步数上限的工具调用循环

pub mod loop_;
pub mod planner;

pub use loop_::{run_tool_loop, tool_system_prompt, LoopOutcome};
pub use planner::{parse_llm_output, repair_prompt, PlannerOutput, ToolCall};
