//! 会话状态
//!
//! SessionState 是状态机的节点；Session 持有一次进程生命周期内的全部可变数据，只在状态转移中修改。

use std::collections::BTreeSet;
use std::fmt;

use crate::llm::LlmHandle;
use crate::planning::TaskPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    WaitingForInput,
    GatheringContext,
    GeneratingPlan,
    ReviewingPlan,
    ExecutingTasks,
    ValidatingTasks,
    FixingValidationErrors,
    GeneratingSummary,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitingForInput => "WAITING_FOR_INPUT",
            Self::GatheringContext => "GATHERING_CONTEXT",
            Self::GeneratingPlan => "GENERATING_PLAN",
            Self::ReviewingPlan => "REVIEWING_PLAN",
            Self::ExecutingTasks => "EXECUTING_TASKS",
            Self::ValidatingTasks => "VALIDATING_TASKS",
            Self::FixingValidationErrors => "FIXING_VALIDATION_ERRORS",
            Self::GeneratingSummary => "GENERATING_SUMMARY",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Session {
    pub state: SessionState,
    /// 当前请求（`@name` 模板已展开）
    pub user_input: String,
    /// 启动时排队的首个请求，第一次进入 WAITING_FOR_INPUT 时消费
    pub initial_prompt: Option<String>,
    pub llm: Option<LlmHandle>,
    pub current_plan: Option<TaskPlan>,
    pub referenced_files: BTreeSet<String>,
    /// 请求中的 `#tag`
    pub tags: Vec<String>,
    /// 计划修改（Modify）的已用次数
    pub retry_count: u32,
    pub fix_attempts: u32,
    pub is_active: bool,
}

impl Session {
    pub fn new(llm: Option<LlmHandle>, initial_prompt: Option<String>) -> Self {
        Self {
            state: SessionState::WaitingForInput,
            user_input: String::new(),
            initial_prompt: initial_prompt.filter(|p| !p.trim().is_empty()),
            llm,
            current_plan: None,
            referenced_files: BTreeSet::new(),
            tags: Vec::new(),
            retry_count: 0,
            fix_attempts: 0,
            is_active: true,
        }
    }

    /// 新请求开始：清掉上一个请求残留的数据
    pub fn begin_request(&mut self, input: String) {
        self.user_input = input;
        self.current_plan = None;
        self.tags.clear();
        self.retry_count = 0;
        self.fix_attempts = 0;
    }

    pub fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "state transition");
        }
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_waiting() {
        let session = Session::new(None, Some("  ".to_string()));
        assert_eq!(session.state, SessionState::WaitingForInput);
        assert!(session.initial_prompt.is_none());
        assert!(session.is_active);
        assert_eq!(SessionState::FixingValidationErrors.to_string(), "FIXING_VALIDATION_ERRORS");
    }
}
