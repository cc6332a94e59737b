//! 任务执行器
//!
//! 按 executionOrder 逐个执行子任务：预读引用文件（读失败记日志后跳过）、拼任务 prompt、
//! 按子任务分层解析 LLM、跑工具循环。任一子任务失败即中止其余子任务。

use crate::core::AgentError;
use crate::llm::LlmHandle;
use crate::planning::{validate_execution_order, LlmTier, Subtask, SubtaskId, SubtaskStatus, TaskPlan};
use crate::react::run_tool_loop;
use crate::tools::{SafeFs, ToolExecutor};

/// 单个预读文件内容上限（字符）
const PRELOAD_MAX_CHARS: usize = 20_000;

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub success: bool,
    pub summary: String,
    /// 失败的子任务与原因
    pub failed: Option<(SubtaskId, String)>,
    pub completed: Vec<SubtaskId>,
}

pub struct TaskExecutor {
    fs: SafeFs,
    tools: ToolExecutor,
    max_steps: usize,
}

impl TaskExecutor {
    pub fn new(fs: SafeFs, tools: ToolExecutor, max_steps: usize) -> Self {
        Self {
            fs,
            tools,
            max_steps,
        }
    }

    /// 执行整个计划，结果写回 plan 的子任务状态与 implementation_details
    pub async fn execute_plan(
        &self,
        plan: &mut TaskPlan,
        handle: &LlmHandle,
        base_prompt: &str,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ExecutionReport, AgentError> {
        let order = plan.execution_order.clone();
        let report = self
            .execute_subtasks(
                &mut plan.subtasks,
                &order,
                handle,
                plan.selected_tier,
                base_prompt,
                on_chunk,
            )
            .await?;
        let details: Vec<String> = order
            .iter()
            .filter_map(|id| plan.subtasks.iter().find(|t| &t.id == id))
            .filter(|t| t.status == SubtaskStatus::Completed)
            .filter_map(|t| {
                t.implementation_details
                    .as_ref()
                    .map(|d| format!("[{}] {}", t.id, d))
            })
            .collect();
        plan.merge_implementation_details(&details.join("\n"));
        Ok(report)
    }

    pub async fn execute_subtasks(
        &self,
        subtasks: &mut [Subtask],
        execution_order: &[SubtaskId],
        handle: &LlmHandle,
        session_tier: Option<LlmTier>,
        base_prompt: &str,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ExecutionReport, AgentError> {
        validate_execution_order(subtasks, execution_order)?;

        let mut completed: Vec<SubtaskId> = Vec::new();
        for id in execution_order {
            let Some(index) = subtasks.iter().position(|t| &t.id == id) else {
                return Err(AgentError::PlanValidation(format!("unknown subtask id '{id}'")));
            };

            subtasks[index].status = SubtaskStatus::InProgress;
            let subtask = &subtasks[index];
            tracing::info!(subtask = %subtask.id, tier = %subtask.llm_tier, "executing subtask");

            let files = self.preload(&subtask.files_to_read);
            let prompt = build_task_prompt(subtask, &files, &completed, subtasks);
            let llm = handle.resolve(subtask.llm_tier, session_tier);

            let result = run_tool_loop(
                llm.as_ref(),
                &self.tools,
                base_prompt,
                &prompt,
                self.max_steps,
                on_chunk,
            )
            .await;

            let subtask = &mut subtasks[index];
            match result {
                Ok(outcome) => {
                    tracing::info!(subtask = %subtask.id, steps = outcome.steps, "subtask completed");
                    subtask.status = SubtaskStatus::Completed;
                    subtask.implementation_details = Some(outcome.response);
                    completed.push(subtask.id.clone());
                }
                Err(e) => {
                    tracing::warn!(subtask = %subtask.id, error = %e, "subtask failed, aborting remaining subtasks");
                    subtask.status = SubtaskStatus::Failed;
                    subtask.implementation_details = Some(e.to_string());
                    let summary = format!(
                        "Subtask '{}' failed: {e}\nCompleted before the failure: {}",
                        subtask.id,
                        if completed.is_empty() {
                            "none".to_string()
                        } else {
                            completed.join(", ")
                        }
                    );
                    return Ok(ExecutionReport {
                        success: false,
                        summary,
                        failed: Some((subtask.id.clone(), e.to_string())),
                        completed,
                    });
                }
            }
        }

        Ok(ExecutionReport {
            success: true,
            summary: completion_summary(subtasks, execution_order),
            failed: None,
            completed,
        })
    }

    fn preload(&self, paths: &[String]) -> Vec<(String, String)> {
        paths
            .iter()
            .filter_map(|path| match self.fs.read_file(path) {
                Ok(content) => Some((path.clone(), content.chars().take(PRELOAD_MAX_CHARS).collect())),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "skipping unreadable referenced file");
                    None
                }
            })
            .collect()
    }
}

fn build_task_prompt(
    subtask: &Subtask,
    files: &[(String, String)],
    completed: &[SubtaskId],
    all: &[Subtask],
) -> String {
    let mut prompt = format!("## Subtask `{}`\n{}\n", subtask.id, subtask.specification);

    let finished: Vec<String> = subtask
        .dependencies
        .iter()
        .filter(|dep| completed.contains(dep))
        .filter_map(|dep| all.iter().find(|t| &t.id == dep))
        .map(|t| {
            format!(
                "- {}: {}",
                t.id,
                t.implementation_details.as_deref().unwrap_or("done")
            )
        })
        .collect();
    if !finished.is_empty() {
        prompt.push_str("\n## Completed prerequisites\n");
        prompt.push_str(&finished.join("\n"));
        prompt.push('\n');
    }

    for (path, content) in files {
        prompt.push_str(&format!("\n## File `{path}`\n```\n{content}\n```\n"));
    }
    prompt.push_str("\nUse the tools to make the required changes, then summarise what you did.");
    prompt
}

/// 按执行顺序列出所有子任务说明
pub fn completion_summary(subtasks: &[Subtask], execution_order: &[SubtaskId]) -> String {
    let lines: Vec<String> = execution_order
        .iter()
        .filter_map(|id| subtasks.iter().find(|t| &t.id == id))
        .enumerate()
        .map(|(i, t)| format!("{}. [{}] {}", i + 1, t.id, t.specification))
        .collect();
    format!("Completed {} subtask(s):\n{}", lines.len(), lines.join("\n"))
}
