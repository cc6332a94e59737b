//! 会话集成测试：脚本化输入 + Mock LLM，覆盖规划、执行、校验、修复与总结

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hive::config::AppConfig;
    use hive::core::{SessionController, SessionState};
    use hive::llm::{LlmHandle, MockLlmClient};
    use hive::memory::HistoryStore;
    use hive::planning::{ComplexityLevel, LlmTier, SubtaskStatus, ValidationStatus};
    use hive::tools::{ApprovalHandler, AutoApprove, FixedApproval};
    use hive::ui::{ReviewChoice, ScriptedIo};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.app.workspace_root = Some(dir.path().to_path_buf());
        config.validation.command = None;
        config
    }

    fn history(dir: &TempDir) -> HistoryStore {
        HistoryStore::new(dir.path().join(".hive/history"))
    }

    async fn run(
        config: AppConfig,
        llm: Arc<MockLlmClient>,
        approval: Arc<dyn ApprovalHandler>,
        io: ScriptedIo,
    ) -> SessionController {
        let mut controller =
            SessionController::new(config, Some(LlmHandle::new(llm)), approval, Box::new(io))
                .unwrap();
        controller.run().await;
        controller
    }

    #[tokio::test]
    async fn test_medium_plan_runs_in_order_and_is_recorded() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.planning.forced_level = Some("MEDIUM".to_string());
        let llm = Arc::new(MockLlmClient::with_responses([
            "Analysis done.",
            "Implementation done.",
            "Tests written.",
            "Docs updated.",
        ]));
        let io = ScriptedIo::new(["Add a caching layer"]);
        let transcript = io.transcript();

        let controller = run(cfg, llm.clone(), Arc::new(AutoApprove), io).await;
        assert!(!controller.session().is_active);
        assert_eq!(llm.call_count(), 4);

        let tasks = history(&dir).load_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        let plan = &tasks[0];
        assert_eq!(plan.overall_complexity, ComplexityLevel::Medium);
        assert_eq!(
            plan.execution_order,
            vec!["analysis", "implementation", "testing", "documentation"]
        );
        assert!(plan.subtasks.iter().all(|t| t.status == SubtaskStatus::Completed));
        assert_eq!(plan.selected_tier, Some(LlmTier::Hybrid));
        assert_eq!(
            plan.validation_result.as_ref().unwrap().status,
            ValidationStatus::Passed
        );
        let details = plan.implementation_details.as_deref().unwrap();
        assert!(details.find("[analysis]").unwrap() < details.find("[documentation]").unwrap());
        assert!(transcript.contains("Completed 4 subtask(s)"));

        // implementation 的 prompt 带上了已完成的 analysis
        let calls = llm.recorded_calls();
        let implementation_prompt = &calls[1].last().unwrap().content;
        assert!(implementation_prompt.contains("analysis: Analysis done."));
    }

    #[tokio::test]
    async fn test_assessed_high_request_with_docs_tag_uses_local_tier() {
        let dir = TempDir::new().unwrap();
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"task_type": 5, "scope_size": 10, "dependencies_count": 9, "technology_complexity": 5}"#,
        ]));
        let io = ScriptedIo::new(["Redesign the storage engine #docs"]);

        run(config(&dir), llm.clone(), Arc::new(AutoApprove), io).await;

        let tasks = history(&dir).load_tasks().unwrap();
        let plan = &tasks[0];
        assert_eq!(plan.overall_complexity, ComplexityLevel::High);
        assert_eq!(plan.subtasks.len(), 9);
        assert!(plan.score.unwrap() >= 70.0);
        assert_eq!(plan.selected_tier, Some(LlmTier::Local));
        // 1 次因子估计 + 9 个子任务
        assert_eq!(llm.call_count(), 10);
    }

    #[tokio::test]
    async fn test_line_edit_through_tool_loop() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "alpha\nbeta\ngamma\n").unwrap();
        let mut cfg = config(&dir);
        cfg.planning.forced_level = Some("LOW".to_string());
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"tool": "edit_file", "args": {"path": "notes.txt", "start_line": 2, "start_content": "beta", "end_line": 2, "end_content": "beta", "new_content": "BETA"}}"#,
            "Uppercased beta.",
        ]));
        let approval = Arc::new(FixedApproval::allow());
        let io = ScriptedIo::new(["Uppercase beta in @notes.txt"]);

        run(cfg, llm.clone(), approval.clone(), io).await;

        let content = std::fs::read_to_string(dir.path().join("notes.txt")).unwrap();
        assert_eq!(content, "alpha\nBETA\ngamma\n");
        assert_eq!(approval.requests(), 1);
        let calls = llm.recorded_calls();
        assert!(calls[0].last().unwrap().content.contains("alpha\nbeta\ngamma"));
        assert!(calls[1]
            .last()
            .unwrap()
            .content
            .contains("Observation from edit_file"));
    }

    #[tokio::test]
    async fn test_denied_write_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep\n").unwrap();
        let mut cfg = config(&dir);
        cfg.planning.forced_level = Some("LOW".to_string());
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"tool": "write_file", "args": {"path": "notes.txt", "content": "replaced\n"}}"#,
            "The user declined the change.",
        ]));
        let approval = Arc::new(FixedApproval::deny());
        let io = ScriptedIo::new(["Rewrite notes.txt"]);

        run(cfg, llm.clone(), approval.clone(), io).await;

        assert_eq!(std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "keep\n");
        assert_eq!(approval.requests(), 1);
        let calls = llm.recorded_calls();
        assert!(calls[1]
            .last()
            .unwrap()
            .content
            .contains("canceled"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fix_loop_falls_back_to_review_after_cap() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.planning.forced_level = Some("LOW".to_string());
        cfg.validation.command = Some("false".to_string());
        cfg.fix.max_attempts = 2;
        let llm = Arc::new(MockLlmClient::new());
        let io = ScriptedIo::new(["Make the build pass"])
            .with_reviews([ReviewChoice::Proceed, ReviewChoice::Cancel]);
        let transcript = io.transcript();

        let controller = run(cfg, llm.clone(), Arc::new(AutoApprove), io).await;

        // 1 次执行 + 2 次修复，之后转人工并取消（取消时的普通答复 1 次）
        assert_eq!(llm.call_count(), 4);
        assert!(transcript.contains("Automatic fix attempt 1/2"));
        assert!(transcript.contains("Automatic fix attempt 2/2"));
        assert!(!transcript.contains("Automatic fix attempt 3/2"));
        assert!(transcript.contains("Validation still failing after 2 automatic fix attempt(s)"));
        assert!(transcript.contains("Plan canceled."));
        assert_eq!(controller.session().state, SessionState::WaitingForInput);
        assert_eq!(controller.session().fix_attempts, 0);
        assert!(history(&dir).load_tasks().unwrap().is_empty());

        let calls = llm.recorded_calls();
        let fix_prompt = &calls[1].last().unwrap().content;
        assert!(fix_prompt.contains("Make the build pass"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fix_that_passes_returns_to_summary() {
        let dir = TempDir::new().unwrap();
        // 第一次校验失败（标记文件不存在），修复子任务写出标记后通过
        let mut cfg = config(&dir);
        cfg.planning.forced_level = Some("LOW".to_string());
        cfg.validation.command = Some("test -f fixed.txt".to_string());
        let llm = Arc::new(MockLlmClient::with_responses([
            "Implemented.",
            r#"{"tool": "write_file", "args": {"path": "fixed.txt", "content": "ok\n"}}"#,
            "Wrote the marker.",
        ]));
        let io = ScriptedIo::new(["Ship it"]);
        let transcript = io.transcript();

        run(cfg, llm, Arc::new(AutoApprove), io).await;

        assert!(transcript.contains("Automatic fix attempt 1/3"));
        assert!(transcript.contains("Validation passed"));
        let tasks = history(&dir).load_tasks().unwrap();
        let plan = &tasks[0];
        assert_eq!(
            plan.validation_result.as_ref().unwrap().status,
            ValidationStatus::Passed
        );
        assert!(plan.implementation_details.as_deref().unwrap().contains("[fix-"));
    }
}
