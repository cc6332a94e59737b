//! 计划校验：TaskPlan -> ValidationResult
//!
//! StatusValidator 看子任务状态，CommandValidator 在工作根目录运行配置的命令（如 `cargo test`），
//! CompositeValidator 顺序执行，第一个 FAILED 即返回。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ValidationSection;
use crate::core::AgentError;
use crate::planning::{SubtaskStatus, TaskPlan, ValidationResult, ValidationStatus};
use crate::tools::run_command;

#[async_trait]
pub trait PlanValidator: Send + Sync {
    fn name(&self) -> &str;

    async fn validate(&self, plan: &TaskPlan) -> Result<ValidationResult, AgentError>;
}

pub struct StatusValidator;

#[async_trait]
impl PlanValidator for StatusValidator {
    fn name(&self) -> &str {
        "status"
    }

    async fn validate(&self, plan: &TaskPlan) -> Result<ValidationResult, AgentError> {
        let failed = plan.failed_subtasks();
        if !failed.is_empty() {
            let reasons: Vec<String> = plan
                .subtasks
                .iter()
                .filter(|t| t.status == SubtaskStatus::Failed)
                .map(|t| {
                    format!(
                        "{}: {}",
                        t.id,
                        t.implementation_details.as_deref().unwrap_or("failed")
                    )
                })
                .collect();
            return Ok(ValidationResult::failed(
                format!("{} subtask(s) failed", failed.len()),
                failed,
            )
            .with_fixes(reasons));
        }
        let unfinished = plan
            .subtasks
            .iter()
            .filter(|t| t.status != SubtaskStatus::Completed)
            .count();
        if unfinished > 0 {
            return Ok(ValidationResult {
                status: ValidationStatus::Pending,
                message: format!("{unfinished} subtask(s) did not run"),
                failed_tasks: Vec::new(),
                suggested_fixes: Vec::new(),
            });
        }
        Ok(ValidationResult::passed("all subtasks completed"))
    }
}

pub struct CommandValidator {
    command: String,
    cwd: PathBuf,
    timeout: Duration,
}

impl CommandValidator {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl PlanValidator for CommandValidator {
    fn name(&self) -> &str {
        "command"
    }

    async fn validate(&self, _plan: &TaskPlan) -> Result<ValidationResult, AgentError> {
        tracing::info!(command = %self.command, "running validation command");
        let out = run_command(&self.command, &self.cwd, self.timeout).await?;
        if out.success {
            Ok(ValidationResult::passed(format!("`{}` succeeded", self.command)))
        } else {
            Ok(ValidationResult::failed(
                format!("`{}` exited with {:?}:\n{}", self.command, out.exit_code, out.combined()),
                Vec::new(),
            )
            .with_fixes(vec![format!(
                "Fix the code so that `{}` passes; the output above shows the failures.",
                self.command
            )]))
        }
    }
}

#[derive(Default)]
pub struct CompositeValidator {
    validators: Vec<Arc<dyn PlanValidator>>,
}

impl CompositeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: Arc<dyn PlanValidator>) -> Self {
        self.validators.push(validator);
        self
    }
}

#[async_trait]
impl PlanValidator for CompositeValidator {
    fn name(&self) -> &str {
        "composite"
    }

    async fn validate(&self, plan: &TaskPlan) -> Result<ValidationResult, AgentError> {
        let mut messages = Vec::new();
        for validator in &self.validators {
            let result = validator.validate(plan).await?;
            tracing::debug!(validator = validator.name(), status = ?result.status, "validator finished");
            match result.status {
                ValidationStatus::Failed => return Ok(result),
                // PENDING 说明子任务被中止，后续命令校验没有意义
                ValidationStatus::Pending => {
                    return Ok(ValidationResult::failed(result.message, plan.failed_subtasks()))
                }
                ValidationStatus::Passed => messages.push(result.message),
            }
        }
        Ok(ValidationResult::passed(messages.join("; ")))
    }
}

/// 按配置组装校验器；未启用时返回 None，会话跳过 VALIDATING 直接总结
pub fn validator_from_config(
    section: &ValidationSection,
    workspace_root: impl Into<PathBuf>,
) -> Option<Arc<dyn PlanValidator>> {
    if !section.enabled {
        return None;
    }
    let mut composite = CompositeValidator::new().with(Arc::new(StatusValidator));
    if let Some(command) = section.command.as_deref().filter(|c| !c.trim().is_empty()) {
        composite = composite.with(Arc::new(CommandValidator::new(
            command,
            workspace_root,
            section.timeout_secs,
        )));
    }
    Some(Arc::new(composite))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::{ComplexityLevel, Decomposer};

    fn plan() -> TaskPlan {
        Decomposer::default()
            .decompose("x", ComplexityLevel::Medium)
            .unwrap()
    }

    #[tokio::test]
    async fn test_status_validator() {
        let mut plan = plan();
        for t in &mut plan.subtasks {
            t.status = SubtaskStatus::Completed;
        }
        assert_eq!(StatusValidator.validate(&plan).await.unwrap().status, ValidationStatus::Passed);

        plan.subtasks[1].status = SubtaskStatus::Failed;
        let result = StatusValidator.validate(&plan).await.unwrap();
        assert_eq!(result.status, ValidationStatus::Failed);
        assert_eq!(result.failed_tasks, vec!["implementation".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_validator_and_composite() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut plan = plan();
        for t in &mut plan.subtasks {
            t.status = SubtaskStatus::Completed;
        }
        let failing = CompositeValidator::new()
            .with(Arc::new(StatusValidator))
            .with(Arc::new(CommandValidator::new("echo broken >&2; exit 3", dir.path(), 10)));
        let result = failing.validate(&plan).await.unwrap();
        assert_eq!(result.status, ValidationStatus::Failed);
        assert!(result.message.contains("broken"));
        assert_eq!(result.suggested_fixes.len(), 1);

        let passing = CommandValidator::new("true", dir.path(), 10);
        assert_eq!(passing.validate(&plan).await.unwrap().status, ValidationStatus::Passed);
    }

    #[test]
    fn test_disabled_validation_yields_none() {
        let section = ValidationSection {
            enabled: false,
            ..ValidationSection::default()
        };
        assert!(validator_from_config(&section, ".").is_none());
        assert!(validator_from_config(&ValidationSection::default(), ".").is_some());
    }
}
