//! 状态边界的错误恢复
//!
//! 某个状态处理失败时，根据所在状态（以及错误类型）给出安全的下一状态与诊断信息，会话循环从不因此退出。

use crate::core::{AgentError, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryAction {
    pub next: SessionState,
    /// 丢弃当前计划
    pub clear_plan: bool,
    pub diagnostic: String,
}

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn recover(&self, state: SessionState, err: &AgentError) -> RecoveryAction {
        use SessionState::*;
        let (next, clear_plan) = match state {
            WaitingForInput | GatheringContext | ReviewingPlan => (WaitingForInput, false),
            GeneratingPlan => (WaitingForInput, true),
            // 执行失败的细节在计划里，交给校验
            ExecutingTasks => match err {
                AgentError::PlanValidation(_) => (WaitingForInput, true),
                _ => (ValidatingTasks, false),
            },
            ValidatingTasks => (GeneratingSummary, false),
            // 修复次数由 FixLoop 限制，到上限会转人工
            FixingValidationErrors => (FixingValidationErrors, false),
            GeneratingSummary => (WaitingForInput, true),
        };
        RecoveryAction {
            next,
            clear_plan,
            diagnostic: diagnostic(state, err),
        }
    }
}

fn diagnostic(state: SessionState, err: &AgentError) -> String {
    let hint = match err {
        AgentError::Configuration(_) => " Check the [llm] section of your configuration.",
        AgentError::Availability(_) | AgentError::Llm(_) => {
            " The LLM backend did not answer; try again or switch provider."
        }
        AgentError::PlanValidation(_) => " The plan was discarded.",
        AgentError::ToolTimeout(_) => " Increase [tools].tool_timeout_secs if this keeps happening.",
        _ => "",
    };
    format!("{state} failed: {err}.{hint}")
}
