//! 分解策略：按复杂度等级把请求拆成有序子任务 DAG
//!
//! - HIGH：分析 -> 规划 -> N 个实现 -> 集成 -> {测试, 文档} -> 终审
//! - MEDIUM：分析 -> 实现 -> {测试, 文档}
//! - LOW：单个子任务

use crate::core::AgentError;
use crate::planning::{ComplexityLevel, LlmTier, Subtask, TaskPlan};

/// 分解策略 trait：每个复杂度等级一个实现
pub trait DecompositionStrategy: Send + Sync {
    fn level(&self) -> ComplexityLevel;

    fn subtasks(&self, request: &str) -> Vec<Subtask>;

    fn decompose(&self, request: &str) -> Result<TaskPlan, AgentError> {
        TaskPlan::new(request, self.level(), self.subtasks(request))
    }
}

pub struct LowComplexityStrategy;

impl DecompositionStrategy for LowComplexityStrategy {
    fn level(&self) -> ComplexityLevel {
        ComplexityLevel::Low
    }

    fn subtasks(&self, request: &str) -> Vec<Subtask> {
        vec![Subtask::new(
            "implementation",
            format!("Implement the request directly: {request}"),
            ComplexityLevel::Low,
            LlmTier::Local,
        )]
    }
}

pub struct MediumComplexityStrategy;

impl DecompositionStrategy for MediumComplexityStrategy {
    fn level(&self) -> ComplexityLevel {
        ComplexityLevel::Medium
    }

    fn subtasks(&self, request: &str) -> Vec<Subtask> {
        let level = ComplexityLevel::Medium;
        vec![
            Subtask::new(
                "analysis",
                format!("Analyze the existing code and requirements for: {request}"),
                level,
                LlmTier::Hybrid,
            ),
            Subtask::new(
                "implementation",
                format!("Implement the changes for: {request}"),
                level,
                LlmTier::Hybrid,
            )
            .depends_on(["analysis"]),
            Subtask::new(
                "testing",
                format!("Write or update tests covering: {request}"),
                level,
                LlmTier::Hybrid,
            )
            .depends_on(["implementation"]),
            Subtask::new(
                "documentation",
                format!("Update documentation for: {request}"),
                ComplexityLevel::Low,
                LlmTier::Local,
            )
            .depends_on(["implementation"]),
        ]
    }
}

/// HIGH：实现子任务的数量由 areas 决定
pub struct HighComplexityStrategy {
    areas: Vec<String>,
}

impl HighComplexityStrategy {
    pub fn new(areas: Vec<String>) -> Self {
        let areas = if areas.is_empty() {
            vec!["core implementation".to_string()]
        } else {
            areas
        };
        Self { areas }
    }
}

impl DecompositionStrategy for HighComplexityStrategy {
    fn level(&self) -> ComplexityLevel {
        ComplexityLevel::High
    }

    fn subtasks(&self, request: &str) -> Vec<Subtask> {
        let level = ComplexityLevel::High;
        let mut tasks = vec![
            Subtask::new(
                "analysis",
                format!("Analyze requirements, constraints and affected code for: {request}"),
                level,
                LlmTier::Remote,
            ),
            Subtask::new(
                "planning",
                format!("Design the architecture and file layout for: {request}"),
                level,
                LlmTier::Remote,
            )
            .depends_on(["analysis"]),
        ];

        let impl_ids: Vec<String> = (1..=self.areas.len())
            .map(|i| format!("implementation-{i}"))
            .collect();
        for (id, area) in impl_ids.iter().zip(&self.areas) {
            tasks.push(
                Subtask::new(
                    id.clone(),
                    format!("Implement the {area} part of: {request}"),
                    ComplexityLevel::Medium,
                    LlmTier::Hybrid,
                )
                .depends_on(["planning"]),
            );
        }

        tasks.push(
            Subtask::new(
                "integration",
                format!("Integrate all implemented parts and resolve interface mismatches for: {request}"),
                level,
                LlmTier::Remote,
            )
            .depends_on(impl_ids.iter().cloned()),
        );
        tasks.push(
            Subtask::new(
                "testing",
                format!("Write and run tests for the integrated solution of: {request}"),
                ComplexityLevel::Medium,
                LlmTier::Hybrid,
            )
            .depends_on(["integration"]),
        );
        tasks.push(
            Subtask::new(
                "documentation",
                format!("Document usage and design of: {request}"),
                ComplexityLevel::Low,
                LlmTier::Local,
            )
            .depends_on(["integration"]),
        );
        tasks.push(
            Subtask::new(
                "review",
                format!("Review the complete change set for correctness and consistency: {request}"),
                level,
                LlmTier::Remote,
            )
            .depends_on(["testing", "documentation"]),
        );
        tasks
    }
}

/// 按等级分派到对应策略
pub struct Decomposer {
    low: LowComplexityStrategy,
    medium: MediumComplexityStrategy,
    high: HighComplexityStrategy,
}

impl Decomposer {
    pub fn new(implementation_areas: Vec<String>) -> Self {
        Self {
            low: LowComplexityStrategy,
            medium: MediumComplexityStrategy,
            high: HighComplexityStrategy::new(implementation_areas),
        }
    }

    pub fn strategy(&self, level: ComplexityLevel) -> &dyn DecompositionStrategy {
        match level {
            ComplexityLevel::Low => &self.low,
            ComplexityLevel::Medium => &self.medium,
            ComplexityLevel::High => &self.high,
        }
    }

    pub fn decompose(&self, request: &str, level: ComplexityLevel) -> Result<TaskPlan, AgentError> {
        let plan = self.strategy(level).decompose(request)?;
        tracing::debug!(
            level = %level,
            subtasks = plan.subtasks.len(),
            "request decomposed"
        );
        Ok(plan)
    }

    /// 按名称分解；无法识别的等级名按 MEDIUM
    pub fn decompose_named(&self, request: &str, level: &str) -> Result<TaskPlan, AgentError> {
        self.decompose(request, ComplexityLevel::parse_or_default(level))
    }
}

impl Default for Decomposer {
    fn default() -> Self {
        Self::new(crate::config::PlanningSection::default().implementation_areas)
    }
}
