//! 计划数据模型：TaskPlan、Subtask、ValidationResult 及相关枚举
//!
//! 依赖关系用 Kahn 拓扑排序校验（邻接表 + 入度表），execution_order 必须是子任务 id 的一个合法拓扑序。

use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

pub type SubtaskId = String;

/// 复杂度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

impl ComplexityLevel {
    /// 按名称解析，无法识别时回落到 Medium
    pub fn parse_or_default(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "LOW" => ComplexityLevel::Low,
            "HIGH" => ComplexityLevel::High,
            _ => ComplexityLevel::Medium,
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplexityLevel::Low => write!(f, "LOW"),
            ComplexityLevel::Medium => write!(f, "MEDIUM"),
            ComplexityLevel::High => write!(f, "HIGH"),
        }
    }
}

/// 执行（子）任务的 LLM 后端类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LlmTier {
    Local,
    Remote,
    Hybrid,
}

impl fmt::Display for LlmTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmTier::Local => write!(f, "LOCAL"),
            LlmTier::Remote => write!(f, "REMOTE"),
            LlmTier::Hybrid => write!(f, "HYBRID"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubtaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// 计划中的原子工作单元
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub specification: String,
    pub complexity: ComplexityLevel,
    pub llm_tier: LlmTier,
    pub dependencies: Vec<SubtaskId>,
    #[serde(default)]
    pub files_to_read: Vec<String>,
    pub status: SubtaskStatus,
    pub implementation_details: Option<String>,
}

impl Subtask {
    pub fn new(
        id: impl Into<String>,
        specification: impl Into<String>,
        complexity: ComplexityLevel,
        llm_tier: LlmTier,
    ) -> Self {
        Self {
            id: id.into(),
            specification: specification.into(),
            complexity,
            llm_tier,
            dependencies: Vec::new(),
            files_to_read: Vec::new(),
            status: SubtaskStatus::Pending,
            implementation_details: None,
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Passed,
    Failed,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub message: String,
    #[serde(default)]
    pub failed_tasks: Vec<SubtaskId>,
    #[serde(default)]
    pub suggested_fixes: Vec<String>,
}

impl ValidationResult {
    pub fn passed(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Passed,
            message: message.into(),
            failed_tasks: Vec::new(),
            suggested_fixes: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>, failed_tasks: Vec<SubtaskId>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            message: message.into(),
            failed_tasks,
            suggested_fixes: Vec::new(),
        }
    }

    pub fn with_fixes(mut self, fixes: Vec<String>) -> Self {
        self.suggested_fixes = fixes;
        self
    }
}

/// 一次请求对应的计划；生成摘要后由会话清空
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    pub original_request: String,
    pub overall_complexity: ComplexityLevel,
    /// 评估得分（0-100），供策略选择使用；等级被强制指定时为 None
    pub score: Option<f64>,
    pub subtasks: Vec<Subtask>,
    pub execution_order: Vec<SubtaskId>,
    /// 审阅通过后由策略选择器写入
    pub selected_tier: Option<LlmTier>,
    pub validation_result: Option<ValidationResult>,
    pub implementation_details: Option<String>,
}

impl TaskPlan {
    /// 由子任务构建计划，并按声明顺序计算稳定拓扑序
    pub fn new(
        original_request: impl Into<String>,
        overall_complexity: ComplexityLevel,
        subtasks: Vec<Subtask>,
    ) -> Result<Self, AgentError> {
        let execution_order = topological_order(&subtasks)?;
        Ok(Self {
            original_request: original_request.into(),
            overall_complexity,
            score: None,
            subtasks,
            execution_order,
            selected_tier: None,
            validation_result: None,
            implementation_details: None,
        })
    }

    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|t| t.id == id)
    }

    /// 校验：id 唯一、依赖存在、execution_order 是 id 的排列且满足依赖先后
    pub fn validate(&self) -> Result<(), AgentError> {
        validate_execution_order(&self.subtasks, &self.execution_order)
    }

    /// 合并一段实现说明（修复任务的产出也追加到这里）
    pub fn merge_implementation_details(&mut self, details: &str) {
        if details.trim().is_empty() {
            return;
        }
        match &mut self.implementation_details {
            Some(existing) => {
                existing.push_str("\n\n");
                existing.push_str(details);
            }
            None => self.implementation_details = Some(details.to_string()),
        }
    }

    pub fn failed_subtasks(&self) -> Vec<SubtaskId> {
        self.subtasks
            .iter()
            .filter(|t| t.status == SubtaskStatus::Failed)
            .map(|t| t.id.clone())
            .collect()
    }
}

fn check_ids(subtasks: &[Subtask]) -> Result<HashMap<&str, usize>, AgentError> {
    let mut index = HashMap::new();
    for (i, task) in subtasks.iter().enumerate() {
        if index.insert(task.id.as_str(), i).is_some() {
            return Err(AgentError::PlanValidation(format!(
                "duplicate subtask id '{}'",
                task.id
            )));
        }
    }
    for task in subtasks {
        for dep in &task.dependencies {
            if dep == &task.id {
                return Err(AgentError::PlanValidation(format!(
                    "subtask '{}' depends on itself",
                    task.id
                )));
            }
            if !index.contains_key(dep.as_str()) {
                return Err(AgentError::PlanValidation(format!(
                    "subtask '{}' depends on unknown id '{}'",
                    task.id, dep
                )));
            }
        }
    }
    Ok(index)
}

/// Kahn 拓扑排序；同一层按声明顺序出队，检测到环时报错
pub fn topological_order(subtasks: &[Subtask]) -> Result<Vec<SubtaskId>, AgentError> {
    let index = check_ids(subtasks)?;
    let mut in_degree = vec![0usize; subtasks.len()];
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); subtasks.len()];
    for (i, task) in subtasks.iter().enumerate() {
        for dep in &task.dependencies {
            let d = index[dep.as_str()];
            adjacency[d].push(i);
            in_degree[i] += 1;
        }
    }

    let mut ready: VecDeque<usize> = (0..subtasks.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(subtasks.len());
    while let Some(i) = ready.pop_front() {
        order.push(subtasks[i].id.clone());
        let mut unlocked = Vec::new();
        for &next in &adjacency[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                unlocked.push(next);
            }
        }
        unlocked.sort_unstable();
        ready.extend(unlocked);
    }

    if order.len() != subtasks.len() {
        return Err(AgentError::PlanValidation(
            "cyclic dependency between subtasks".to_string(),
        ));
    }
    Ok(order)
}

/// 校验外部给出的执行顺序；缺失或多余的 id 都视为计划错误，不做静默重排
pub fn validate_execution_order(
    subtasks: &[Subtask],
    execution_order: &[SubtaskId],
) -> Result<(), AgentError> {
    let index = check_ids(subtasks)?;

    let mut position: HashMap<&str, usize> = HashMap::new();
    for (pos, id) in execution_order.iter().enumerate() {
        if !index.contains_key(id.as_str()) {
            return Err(AgentError::PlanValidation(format!(
                "execution order references unknown subtask '{}'",
                id
            )));
        }
        if position.insert(id.as_str(), pos).is_some() {
            return Err(AgentError::PlanValidation(format!(
                "subtask '{}' appears twice in execution order",
                id
            )));
        }
    }

    if let Some(id) = subtasks
        .iter()
        .map(|t| t.id.as_str())
        .find(|id| !position.contains_key(id))
    {
        return Err(AgentError::PlanValidation(format!(
            "subtask '{}' is missing from execution order",
            id
        )));
    }

    for task in subtasks {
        let own = position[task.id.as_str()];
        for dep in &task.dependencies {
            if position[dep.as_str()] >= own {
                return Err(AgentError::PlanValidation(format!(
                    "subtask '{}' is scheduled before its dependency '{}'",
                    task.id, dep
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Subtask {
        Subtask::new(id, format!("do {id}"), ComplexityLevel::Low, LlmTier::Local)
            .depends_on(deps.iter().copied())
    }

    #[test]
    fn test_topological_order_respects_dependencies() {
        let tasks = vec![task("b", &["a"]), task("a", &[]), task("c", &["a", "b"])];
        let order = topological_order(&tasks).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
        validate_execution_order(&tasks, &order).unwrap();
    }

    #[test]
    fn test_cycle_detected() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"])];
        assert!(matches!(
            topological_order(&tasks),
            Err(AgentError::PlanValidation(_))
        ));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let tasks = vec![task("a", &["ghost"])];
        assert!(topological_order(&tasks).is_err());
    }

    #[test]
    fn test_missing_id_in_order_is_error() {
        let tasks = vec![task("a", &[]), task("b", &["a"])];
        let err = validate_execution_order(&tasks, &["a".to_string()]).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_order_violating_dependency_is_error() {
        let tasks = vec![task("a", &[]), task("b", &["a"])];
        let order = vec!["b".to_string(), "a".to_string()];
        assert!(validate_execution_order(&tasks, &order).is_err());
    }

    #[test]
    fn test_self_dependency_is_rejected() {
        let tasks = vec![task("a", &[]), task("b", &["b"])];
        let order = vec!["a".to_string(), "b".to_string()];
        let err = validate_execution_order(&tasks, &order).unwrap_err();
        assert!(err.to_string().contains("depends on itself"));
        assert!(topological_order(&tasks).is_err());
    }

    #[test]
    fn test_parse_level_defaults_to_medium() {
        assert_eq!(ComplexityLevel::parse_or_default("high"), ComplexityLevel::High);
        assert_eq!(ComplexityLevel::parse_or_default("LOW"), ComplexityLevel::Low);
        assert_eq!(ComplexityLevel::parse_or_default("extreme"), ComplexityLevel::Medium);
    }

    #[test]
    fn test_merge_implementation_details() {
        let mut plan = TaskPlan::new("req", ComplexityLevel::Low, vec![task("a", &[])]).unwrap();
        plan.merge_implementation_details("first");
        plan.merge_implementation_details("  ");
        plan.merge_implementation_details("second");
        assert_eq!(plan.implementation_details.as_deref(), Some("first\n\nsecond"));
    }
}
