//! 终端交互层：UserIo 抽象（输入、计划审阅、反馈、诊断输出），控制台实现与脚本化实现

pub mod console;
pub mod scripted;

use async_trait::async_trait;

use crate::planning::{SubtaskStatus, TaskPlan};

pub use console::ConsoleIo;
pub use scripted::{ScriptedIo, Transcript};

/// 用户对计划的选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewChoice {
    Proceed,
    Modify,
    Cancel,
}

#[async_trait]
pub trait UserIo: Send {
    /// None 表示输入流结束（EOF），会话随之退出
    async fn read_input(&mut self) -> Option<String>;

    async fn review_plan(&mut self, rendered_plan: &str) -> ReviewChoice;

    /// 计划修改意见
    async fn collect_feedback(&mut self) -> Option<String>;

    /// 模型答复与总结
    fn show(&mut self, text: &str);

    /// 进度提示
    fn status(&mut self, text: &str);

    fn diagnostic(&mut self, text: &str);

    /// 流式输出片段
    fn stream_chunk(&mut self, chunk: &str);

    fn clear(&mut self) {}
}

/// 计划的文本展示（审阅与总结共用）
pub fn render_plan(plan: &TaskPlan) -> String {
    let mut out = format!(
        "Plan for: {}\nComplexity: {}{}\n",
        plan.original_request,
        plan.overall_complexity,
        match plan.score {
            Some(score) => format!(" (score {score:.1})"),
            None => String::new(),
        }
    );
    for (i, id) in plan.execution_order.iter().enumerate() {
        let Some(task) = plan.subtask(id) else {
            continue;
        };
        let marker = match task.status {
            SubtaskStatus::Pending => " ",
            SubtaskStatus::InProgress => ">",
            SubtaskStatus::Completed => "x",
            SubtaskStatus::Failed => "!",
        };
        let deps = if task.dependencies.is_empty() {
            String::new()
        } else {
            format!(" (after {})", task.dependencies.join(", "))
        };
        out.push_str(&format!(
            "  {}. [{marker}] {} [{}]{deps}\n     {}\n",
            i + 1,
            task.id,
            task.llm_tier,
            task.specification
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::{ComplexityLevel, Decomposer};

    #[test]
    fn test_render_plan_lists_subtasks_in_order() {
        let plan = Decomposer::default()
            .decompose("Add login", ComplexityLevel::Medium)
            .unwrap();
        let text = render_plan(&plan);
        let analysis = text.find("analysis").unwrap();
        let implementation = text.find("implementation [").unwrap();
        assert!(analysis < implementation);
        assert!(text.contains("Complexity: MEDIUM"));
        assert!(text.contains("(after implementation)"));
    }
}
