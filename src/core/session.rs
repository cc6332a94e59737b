//! 会话状态机
//!
//! WAITING_FOR_INPUT -> GATHERING_CONTEXT -> GENERATING_PLAN -> REVIEWING_PLAN -> EXECUTING_TASKS
//! -> VALIDATING_TASKS <-> FIXING_VALIDATION_ERRORS -> GENERATING_SUMMARY -> WAITING_FOR_INPUT
//!
//! 每个状态的处理在 step() 边界捕获错误，交给 RecoveryEngine 降级到安全状态；单次失败不会结束会话。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::core::{AgentError, FixDecision, FixLoop, RecoveryEngine, Session, SessionState};
use crate::executor::{completion_summary, TaskExecutor};
use crate::llm::{generate_stream, generate_structured, LlmHandle};
use crate::memory::{ChatHistory, HistoryStore, Message, Role};
use crate::planning::{
    heuristic_factors, AssessorConfig, ComplexityAssessor, ComplexityFactors, ComplexityLevel,
    Decomposer, LlmStrategySelector, LlmTier, Subtask, SubtaskStatus, TaskPlan, ValidationResult,
    ValidationStatus,
};
use crate::prompts::PromptStore;
use crate::tools::{task_toolset, ApprovalHandler, SafeFs};
use crate::ui::{render_plan, ReviewChoice, UserIo};
use crate::validation::{validator_from_config, PlanValidator};

/// 计划最多按反馈修改一次，之后只能执行或取消
const MAX_PLAN_REVISIONS: u32 = 1;
/// direct response 携带的历史条数
const DIRECT_CONTEXT_MESSAGES: usize = 10;

pub struct SessionController {
    session: Session,
    io: Box<dyn UserIo>,
    config: AppConfig,
    fs: SafeFs,
    assessor: ComplexityAssessor,
    decomposer: Decomposer,
    selector: LlmStrategySelector,
    executor: TaskExecutor,
    validator: Option<Arc<dyn PlanValidator>>,
    fix: FixLoop,
    recovery: RecoveryEngine,
    prompts: PromptStore,
    chat: ChatHistory,
    history: HistoryStore,
    forced_level: Option<ComplexityLevel>,
    token_re: Regex,
}

impl SessionController {
    pub fn new(
        config: AppConfig,
        llm: Option<LlmHandle>,
        approval: Arc<dyn ApprovalHandler>,
        io: Box<dyn UserIo>,
    ) -> Result<Self, AgentError> {
        let root = config.workspace_root();
        let fs = SafeFs::new(&root)?
            .with_ignore_patterns(&config.tools.ignore_patterns)
            .with_max_file_bytes(config.tools.max_file_bytes);
        let tools = task_toolset(&fs, approval, &config.tools);
        let executor = TaskExecutor::new(fs.clone(), tools, config.tools.max_steps);
        let assessor = ComplexityAssessor::new(AssessorConfig::from_section(&config.planning))?;
        let validator = validator_from_config(&config.validation, fs.root());
        let prompts = PromptStore::load(under_root(fs.root(), &config.app.prompts_dir));
        let history = HistoryStore::new(under_root(fs.root(), &config.app.history_dir));
        let forced_level = config
            .planning
            .forced_level
            .as_deref()
            .map(ComplexityLevel::parse_or_default);
        let token_re = Regex::new(r"(?:^|\s)([@#])([\w./\-]+)")
            .map_err(|e| AgentError::Configuration(e.to_string()))?;

        let initial_prompt = config.app.initial_prompt.clone();
        Ok(Self {
            session: Session::new(llm, initial_prompt),
            io,
            decomposer: Decomposer::new(config.planning.implementation_areas.clone()),
            selector: LlmStrategySelector::new(&config.strategy),
            fix: FixLoop::new(config.fix.max_attempts),
            chat: ChatHistory::new(config.app.max_history),
            config,
            fs,
            assessor,
            executor,
            validator,
            recovery: RecoveryEngine::new(),
            prompts,
            history,
            forced_level,
            token_re,
        })
    }

    /// 替换校验器（None 表示不校验）
    pub fn with_validator(mut self, validator: Option<Arc<dyn PlanValidator>>) -> Self {
        self.validator = validator;
        self
    }

    /// 排队一个首个请求（覆盖配置中的 initial_prompt）
    pub fn with_initial_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.trim().is_empty() {
            self.session.initial_prompt = Some(prompt);
        }
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn chat(&self) -> &ChatHistory {
        &self.chat
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub async fn run(&mut self) {
        tracing::info!(root = %self.fs.root().display(), "session started");
        while self.session.is_active {
            self.step().await;
        }
        tracing::info!("session ended");
    }

    /// 处理当前状态一次；错误在这里被吸收并转成恢复转移
    pub async fn step(&mut self) {
        let state = self.session.state;
        if let Err(err) = self.handle(state).await {
            let action = self.recovery.recover(state, &err);
            tracing::error!(state = %state, error = %err, next = %action.next, "state failed");
            self.io.diagnostic(&action.diagnostic);
            if action.clear_plan {
                self.session.current_plan = None;
            }
            self.session.transition(action.next);
        }
    }

    async fn handle(&mut self, state: SessionState) -> Result<(), AgentError> {
        match state {
            SessionState::WaitingForInput => self.wait_for_input().await,
            SessionState::GatheringContext => self.gather_context().await,
            SessionState::GeneratingPlan => self.generate_plan().await,
            SessionState::ReviewingPlan => self.review_plan().await,
            SessionState::ExecutingTasks => self.execute_tasks().await,
            SessionState::ValidatingTasks => self.validate_tasks().await,
            SessionState::FixingValidationErrors => self.fix_validation_errors().await,
            SessionState::GeneratingSummary => self.generate_summary(),
        }
    }

    async fn wait_for_input(&mut self) -> Result<(), AgentError> {
        let input = match self.session.initial_prompt.take() {
            Some(prompt) => prompt,
            None => match self.io.read_input().await {
                Some(line) => line,
                None => {
                    self.session.is_active = false;
                    return Ok(());
                }
            },
        };
        let input = input.trim();
        if input.is_empty() {
            return Ok(());
        }
        if input.starts_with('/') {
            self.dispatch_command(input);
            return Ok(());
        }

        self.session.begin_request(input.to_string());
        self.fix.reset();
        for cap in self.token_re.captures_iter(input) {
            let value = cap[2].trim_end_matches(['.', ',', ';', ':']).to_string();
            if value.is_empty() {
                continue;
            }
            match &cap[1] {
                "#" => self.session.tags.push(value),
                _ if self.prompts.get(&value).is_some() => {}
                _ => {
                    self.session.referenced_files.insert(value);
                }
            }
        }
        self.session.transition(SessionState::GatheringContext);
        Ok(())
    }

    fn dispatch_command(&mut self, input: &str) {
        let mut parts = input.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();
        match command {
            "/exit" | "/quit" => {
                self.io.show("Goodbye.");
                self.session.is_active = false;
            }
            "/save" if arg.is_empty() => self.io.diagnostic("Usage: /save <name>"),
            "/save" => match self.history.save_chat(arg, self.chat.entries()) {
                Ok(path) => self.io.show(&format!("Chat history saved to {}", path.display())),
                Err(e) => self.io.diagnostic(&format!("Could not save history: {e}")),
            },
            "/prompts" => {
                let names = self.prompts.names();
                if names.is_empty() {
                    self.io
                        .show(&format!("No prompt templates in {}", self.prompts.dir().display()));
                } else {
                    let list: Vec<String> = names.iter().map(|n| format!("  @{n}")).collect();
                    self.io.show(&format!("Prompt templates:\n{}", list.join("\n")));
                }
            }
            "/clear" => {
                self.chat.clear();
                self.session.referenced_files.clear();
                self.io.clear();
                self.io.status("History and referenced files cleared.");
            }
            other => self.io.diagnostic(&format!(
                "Unknown command {other}. Available: /exit, /quit, /save <name>, /prompts, /clear"
            )),
        }
    }

    async fn gather_context(&mut self) -> Result<(), AgentError> {
        self.session.user_input = self.expand_templates(&self.session.user_input);

        let missing: Vec<String> = self
            .session
            .referenced_files
            .iter()
            .filter(|path| !self.fs.resolve(path).map(|p| p.is_file()).unwrap_or(false))
            .cloned()
            .collect();
        for path in missing {
            self.io.diagnostic(&format!("Referenced file not found, ignoring: {path}"));
            self.session.referenced_files.remove(&path);
        }
        self.chat.push(Role::User, self.session.user_input.clone());

        if self.config.planning.enabled && self.session.llm.is_some() {
            self.session.transition(SessionState::GeneratingPlan);
        } else {
            self.session.transition(SessionState::WaitingForInput);
            self.direct_response().await?;
        }
        Ok(())
    }

    /// `@name` 命中模板时替换为模板正文
    fn expand_templates(&self, input: &str) -> String {
        let mut out = input.to_string();
        for cap in self.token_re.captures_iter(input) {
            if &cap[1] != "@" {
                continue;
            }
            let name = cap[2].trim_end_matches(['.', ',', ';', ':']);
            if let Some(body) = self.prompts.get(name) {
                out = out.replacen(&format!("@{name}"), body.trim(), 1);
            }
        }
        out
    }

    async fn direct_response(&mut self) -> Result<(), AgentError> {
        let Some(handle) = self.session.llm.clone() else {
            self.io.diagnostic("No LLM is configured, so this request cannot be answered.");
            return Ok(());
        };
        let mut messages = vec![Message::system(self.system_prompt())];
        messages.extend(self.chat.recent_messages(DIRECT_CONTEXT_MESSAGES));
        if let Some(files) = self.referenced_file_context() {
            messages.push(Message::user(files));
        }

        let client = handle.default_client();
        let io = &mut self.io;
        let text = generate_stream(client.as_ref(), &messages, &mut |chunk| io.stream_chunk(chunk)).await?;
        self.io.show(&text);
        self.chat.push(Role::Assistant, text);
        Ok(())
    }

    async fn generate_plan(&mut self) -> Result<(), AgentError> {
        let handle = self.require_llm()?;
        let request = self.session.user_input.clone();

        let (level, score) = match self.forced_level {
            Some(level) => {
                self.io.status(&format!("Complexity forced to {level}"));
                (level, None)
            }
            None => {
                self.io.status("Assessing complexity...");
                let client = handle.default_client();
                let factors = match generate_structured::<ComplexityFactors>(
                    client.as_ref(),
                    &factor_prompt(&request),
                )
                .await
                {
                    Ok(factors) => factors,
                    Err(e) => {
                        tracing::warn!(error = %e, "factor estimation failed, using heuristic");
                        heuristic_factors(&request)
                    }
                };
                let assessment = self.assessor.assess(&factors);
                self.io.status(&assessment.explanation);
                (assessment.level, Some(assessment.score))
            }
        };

        let mut plan = self.decomposer.decompose(&request, level)?;
        plan.score = score;
        let files: Vec<String> = self.session.referenced_files.iter().cloned().collect();
        for task in &mut plan.subtasks {
            task.files_to_read.extend(files.iter().cloned());
        }
        tracing::info!(level = %level, subtasks = plan.subtasks.len(), "plan generated");
        self.session.current_plan = Some(plan);
        self.session.transition(SessionState::ReviewingPlan);
        Ok(())
    }

    async fn review_plan(&mut self) -> Result<(), AgentError> {
        let rendered = render_plan(self.require_plan()?);
        match self.io.review_plan(&rendered).await {
            ReviewChoice::Proceed => {
                let plan = self.require_plan()?;
                let tags = &self.session.tags;
                let tier = match plan.score {
                    Some(score) => self.selector.select_llm_type(plan.overall_complexity, score, tags),
                    None => self.selector.select_for_level(plan.overall_complexity, tags),
                };
                self.require_plan_mut()?.selected_tier = Some(tier);
                self.io.status(&format!("Executing with the {tier} tier"));
                self.session.transition(SessionState::ExecutingTasks);
            }
            ReviewChoice::Modify if self.session.retry_count >= MAX_PLAN_REVISIONS => {
                self.io.diagnostic("The plan was already revised; proceed or cancel.");
                self.cancel_plan().await?;
            }
            ReviewChoice::Modify => {
                let Some(feedback) = self.io.collect_feedback().await.filter(|f| !f.trim().is_empty())
                else {
                    self.io.status("No changes requested.");
                    return Ok(());
                };
                self.session.retry_count += 1;
                self.session.user_input = format!(
                    "{}\n\nAdditional requirements: {}",
                    self.session.user_input,
                    feedback.trim()
                );
                self.session.current_plan = None;
                self.session.transition(SessionState::GeneratingPlan);
            }
            ReviewChoice::Cancel => self.cancel_plan().await?,
        }
        Ok(())
    }

    /// 取消计划后给出不改文件的普通答复
    async fn cancel_plan(&mut self) -> Result<(), AgentError> {
        self.session.current_plan = None;
        self.session.transition(SessionState::WaitingForInput);
        self.io.status("Plan canceled.");
        self.direct_response().await
    }

    async fn execute_tasks(&mut self) -> Result<(), AgentError> {
        let handle = self.require_llm()?;
        let base = self.base_prompt()?;
        let mut plan = self
            .session
            .current_plan
            .take()
            .ok_or_else(|| AgentError::Execution("no plan to execute".to_string()))?;

        let executor = &self.executor;
        let io = &mut self.io;
        let result = executor
            .execute_plan(&mut plan, &handle, &base, &mut |chunk| io.stream_chunk(chunk))
            .await;
        self.session.current_plan = Some(plan);
        let report = result?;

        if report.success {
            self.io.status(&report.summary);
        } else {
            self.io.diagnostic(&report.summary);
        }
        let next = if self.validator.is_some() {
            SessionState::ValidatingTasks
        } else {
            SessionState::GeneratingSummary
        };
        self.session.transition(next);
        Ok(())
    }

    async fn validate_tasks(&mut self) -> Result<(), AgentError> {
        let Some(validator) = self.validator.clone() else {
            self.session.transition(SessionState::GeneratingSummary);
            return Ok(());
        };
        self.io.status("Validating changes...");
        let result = validator.validate(self.require_plan()?).await?;
        tracing::info!(status = ?result.status, "validation finished");

        let passed = result.status == ValidationStatus::Passed;
        if passed {
            self.io.status(&format!("Validation passed: {}", result.message));
        } else {
            self.io.diagnostic(&format!("Validation failed: {}", result.message));
        }
        self.require_plan_mut()?.validation_result = Some(result);

        if passed {
            self.fix.reset();
            self.session.fix_attempts = 0;
            self.session.transition(SessionState::GeneratingSummary);
        } else {
            self.session.transition(SessionState::FixingValidationErrors);
        }
        Ok(())
    }

    async fn fix_validation_errors(&mut self) -> Result<(), AgentError> {
        let Some(plan) = self.session.current_plan.as_ref() else {
            self.fix.reset();
            self.session.fix_attempts = 0;
            self.session.transition(SessionState::WaitingForInput);
            return Ok(());
        };
        let result = plan
            .validation_result
            .clone()
            .unwrap_or_else(|| ValidationResult::failed("validation result missing", Vec::new()));
        let (complexity, session_tier) = (plan.overall_complexity, plan.selected_tier);
        let original_request = plan.original_request.clone();

        let (prompt, attempt) = match self.fix.on_failure(&result, &original_request) {
            FixDecision::ManualFallback { message } => {
                self.session.fix_attempts = 0;
                self.io.diagnostic(&message);
                self.session.transition(SessionState::ReviewingPlan);
                return Ok(());
            }
            FixDecision::Retry { prompt, attempt } => (prompt, attempt),
        };
        self.session.fix_attempts = attempt;
        self.io.status(&format!(
            "Automatic fix attempt {attempt}/{}",
            self.fix.max_attempts()
        ));

        let handle = self.require_llm()?;
        let base = self.base_prompt()?;
        let fix_id = format!("fix-{}", Uuid::new_v4());
        let mut fix_task = Subtask::new(fix_id.clone(), prompt, complexity, LlmTier::Hybrid);
        fix_task.files_to_read = self.session.referenced_files.iter().cloned().collect();
        let mut tasks = vec![fix_task];

        let executor = &self.executor;
        let io = &mut self.io;
        let report = executor
            .execute_subtasks(
                &mut tasks,
                std::slice::from_ref(&fix_id),
                &handle,
                session_tier,
                &base,
                &mut |chunk| io.stream_chunk(chunk),
            )
            .await?;

        if !report.success {
            // 留在 FIXING，下一轮消耗新的尝试次数
            self.io.diagnostic(&report.summary);
            return Ok(());
        }

        let details = tasks[0].implementation_details.clone().unwrap_or_default();
        let plan = self.require_plan_mut()?;
        plan.merge_implementation_details(&format!("[{fix_id}] {details}"));
        for task in &mut plan.subtasks {
            if task.status != SubtaskStatus::Completed {
                task.status = SubtaskStatus::Completed;
                task.implementation_details = Some(format!("resolved by {fix_id}"));
            }
        }
        self.session.transition(SessionState::ValidatingTasks);
        Ok(())
    }

    fn generate_summary(&mut self) -> Result<(), AgentError> {
        self.fix.reset();
        self.session.fix_attempts = 0;
        self.session.transition(SessionState::WaitingForInput);
        let Some(plan) = self.session.current_plan.take() else {
            return Ok(());
        };

        let all_done = plan
            .subtasks
            .iter()
            .all(|t| t.status == SubtaskStatus::Completed);
        let mut summary = if all_done {
            completion_summary(&plan.subtasks, &plan.execution_order)
        } else {
            format!("Finished with unresolved subtasks:\n{}", render_plan(&plan))
        };
        if let Some(result) = &plan.validation_result {
            summary.push_str(&format!("\nValidation: {:?} - {}", result.status, result.message));
        }
        self.io.show(&summary);
        self.chat.push(Role::Assistant, summary);

        if let Err(e) = self.history.append_task(&plan) {
            tracing::warn!(error = %e, "failed to record task history");
            self.io.diagnostic(&format!("Could not record task history: {e}"));
        }
        Ok(())
    }

    fn require_llm(&self) -> Result<LlmHandle, AgentError> {
        self.session
            .llm
            .clone()
            .ok_or_else(|| AgentError::Configuration("no LLM is configured".to_string()))
    }

    fn require_plan(&self) -> Result<&TaskPlan, AgentError> {
        self.session
            .current_plan
            .as_ref()
            .ok_or_else(|| AgentError::Execution("no current plan".to_string()))
    }

    fn require_plan_mut(&mut self) -> Result<&mut TaskPlan, AgentError> {
        self.session
            .current_plan
            .as_mut()
            .ok_or_else(|| AgentError::Execution("no current plan".to_string()))
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are {}, a coding assistant working on the project at {}. \
             Keep answers concise and concrete.",
            self.config.app.name.as_deref().unwrap_or("hive"),
            self.fs.root().display()
        )
    }

    /// 子任务执行的 system prompt：总请求 + 工作约束
    fn base_prompt(&self) -> Result<String, AgentError> {
        let plan = self.require_plan()?;
        Ok(format!(
            "{}\n\nOverall request: {}\n\
             All paths are relative to the project root. Read files before editing them; \
             edit_file needs the exact current text of the boundary lines.",
            self.system_prompt(),
            plan.original_request
        ))
    }

    fn referenced_file_context(&self) -> Option<String> {
        let blocks: Vec<String> = self
            .session
            .referenced_files
            .iter()
            .filter_map(|path| match self.fs.read_file(path) {
                Ok(content) => Some(format!("File `{path}`:\n```\n{content}\n```")),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "skipping referenced file");
                    None
                }
            })
            .collect();
        (!blocks.is_empty()).then(|| format!("Referenced files:\n\n{}", blocks.join("\n\n")))
    }
}

fn under_root(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn factor_prompt(request: &str) -> String {
    format!(
        "Estimate the complexity factors of this software change request.\n\
         task_type: 1 (trivial edit) to 5 (new system or architecture)\n\
         scope_size: 1 (one file) to 10 (whole codebase)\n\
         dependencies_count: 0 to 10 external systems or modules involved\n\
         technology_complexity: 1 (plain code) to 5 (concurrency, security, distributed)\n\
         prior_success_rate: omit unless known, 0.0 to 1.0\n\nRequest: {request}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::AutoApprove;
    use crate::ui::ScriptedIo;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.app.workspace_root = Some(dir.path().to_path_buf());
        config.validation.enabled = false;
        config
    }

    fn controller(
        config: AppConfig,
        llm: Option<Arc<MockLlmClient>>,
        io: ScriptedIo,
    ) -> SessionController {
        let handle = llm.map(|l| LlmHandle::new(l));
        SessionController::new(config, handle, Arc::new(AutoApprove), Box::new(io)).unwrap()
    }

    #[tokio::test]
    async fn test_commands_loop_back_to_waiting() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("config/prompts")).unwrap();
        std::fs::write(dir.path().join("config/prompts/review.md"), "Review it").unwrap();
        let io = ScriptedIo::new(["/prompts", "/save", "/save s1", "/bogus", "/clear", "/exit"]);
        let transcript = io.transcript();
        let mut c = controller(config(&dir), None, io);
        c.run().await;

        assert!(!c.session().is_active);
        assert_eq!(c.session().state, SessionState::WaitingForInput);
        assert!(transcript.contains("@review"));
        assert!(transcript.contains("Usage: /save <name>"));
        assert!(dir.path().join(".hive/history/s1.json").exists());
        assert!(transcript.contains("Unknown command /bogus"));
        assert!(transcript.contains("clear"));
        assert!(transcript.contains("Goodbye."));
    }

    #[tokio::test]
    async fn test_references_and_tags_are_extracted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
        let mut cfg = config(&dir);
        cfg.planning.enabled = false;
        let llm = Arc::new(MockLlmClient::with_responses(["Looks fine."]));
        let io = ScriptedIo::new(["check @main.rs and @nope.rs. #security"]);
        let transcript = io.transcript();
        let mut c = controller(cfg, Some(llm.clone()), io);

        c.step().await;
        assert_eq!(c.session().state, SessionState::GatheringContext);
        assert_eq!(c.session().tags, vec!["security".to_string()]);
        assert!(c.session().referenced_files.contains("main.rs"));
        assert!(c.session().referenced_files.contains("nope.rs"));

        c.step().await;
        assert_eq!(c.session().state, SessionState::WaitingForInput);
        assert!(!c.session().referenced_files.contains("nope.rs"));
        assert!(transcript.contains("Referenced file not found, ignoring: nope.rs"));
        assert!(transcript.contains("show: Looks fine."));
        let last_call = llm.recorded_calls().pop().unwrap();
        assert!(last_call.last().unwrap().content.contains("fn main() {}"));
        assert_eq!(c.chat().len(), 2);
    }

    #[tokio::test]
    async fn test_templates_expand_inline() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("config/prompts")).unwrap();
        std::fs::write(dir.path().join("config/prompts/style.md"), "Follow the style guide.").unwrap();
        let mut cfg = config(&dir);
        cfg.planning.enabled = false;
        let llm = Arc::new(MockLlmClient::with_responses(["ok"]));
        let io = ScriptedIo::new(["Refactor utils. @style"]);
        let mut c = controller(cfg, Some(llm), io);
        c.step().await;
        c.step().await;
        assert_eq!(c.session().user_input, "Refactor utils. Follow the style guide.");
        assert!(c.session().referenced_files.is_empty());
    }

    #[tokio::test]
    async fn test_no_llm_gives_diagnostic() {
        let dir = TempDir::new().unwrap();
        let io = ScriptedIo::new(["do something"]);
        let transcript = io.transcript();
        let mut c = controller(config(&dir), None, io);
        c.run().await;
        assert!(transcript.contains("No LLM is configured"));
    }

    #[tokio::test]
    async fn test_forced_low_plan_and_cancel() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.planning.forced_level = Some("LOW".to_string());
        let llm = Arc::new(MockLlmClient::with_responses(["Here is how you could do it."]));
        let io = ScriptedIo::new(["Implement a user authentication system"])
            .with_reviews([ReviewChoice::Cancel]);
        let transcript = io.transcript();
        let mut c = controller(cfg, Some(llm.clone()), io);

        c.step().await;
        c.step().await;
        c.step().await;
        let plan = c.session().current_plan.as_ref().unwrap();
        assert_eq!(plan.subtasks.len(), 1);
        assert!(plan.subtasks[0].dependencies.is_empty());
        assert_eq!(plan.subtasks[0].llm_tier, LlmTier::Local);
        assert_eq!(plan.score, None);
        assert_eq!(llm.call_count(), 0);

        c.step().await;
        assert!(c.session().current_plan.is_none());
        assert_eq!(c.session().state, SessionState::WaitingForInput);
        assert!(transcript.contains("Plan canceled."));
        assert!(transcript.contains("show: Here is how you could do it."));
    }

    #[tokio::test]
    async fn test_zero_assessed_score_still_selects_by_threshold() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.strategy.hybrid_threshold = 0.0;
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"task_type": 1, "scope_size": 1, "dependencies_count": 0, "technology_complexity": 1}"#,
        ]));
        let io = ScriptedIo::new(["Fix a typo"]).with_reviews([ReviewChoice::Proceed]);
        let mut c = controller(cfg, Some(llm.clone()), io);

        for _ in 0..4 {
            c.step().await;
        }
        assert_eq!(llm.call_count(), 1);
        assert_eq!(c.session().state, SessionState::ExecutingTasks);
        let plan = c.session().current_plan.as_ref().unwrap();
        assert_eq!(plan.overall_complexity, ComplexityLevel::Low);
        assert_eq!(plan.score, Some(0.0));
        // 得分 0 仍是评估结果，按阈值得到 HYBRID 而不是按等级的 LOCAL
        assert_eq!(plan.selected_tier, Some(LlmTier::Hybrid));
    }

    #[tokio::test]
    async fn test_modify_regenerates_plan_once() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.planning.forced_level = Some("MEDIUM".to_string());
        let llm = Arc::new(MockLlmClient::new());
        let io = ScriptedIo::new(["Add caching"])
            .with_reviews([ReviewChoice::Modify, ReviewChoice::Modify])
            .with_feedback(["use an LRU"]);
        let transcript = io.transcript();
        let mut c = controller(cfg, Some(llm), io);

        for _ in 0..5 {
            c.step().await;
        }
        assert_eq!(c.session().retry_count, 1);
        assert!(c
            .session()
            .current_plan
            .as_ref()
            .unwrap()
            .original_request
            .contains("Additional requirements: use an LRU"));
        assert_eq!(c.session().state, SessionState::ReviewingPlan);

        c.step().await;
        assert!(transcript.contains("already revised"));
        assert!(c.session().current_plan.is_none());
    }
}
