//! 规划层：计划数据模型、复杂度评估、分解策略、LLM 分层选择

pub mod assessor;
pub mod decomposition;
pub mod selector;
pub mod types;

pub use assessor::{
    heuristic_factors, AssessorConfig, ComplexityAssessment, ComplexityAssessor,
    ComplexityFactors, FactorContribution, FactorRange,
};
pub use decomposition::{
    Decomposer, DecompositionStrategy, HighComplexityStrategy, LowComplexityStrategy,
    MediumComplexityStrategy,
};
pub use selector::{tier_for_level, tier_for_level_name, LlmStrategySelector};
pub use types::{
    topological_order, validate_execution_order, ComplexityLevel, LlmTier, Subtask, SubtaskId,
    SubtaskStatus, TaskPlan, ValidationResult, ValidationStatus,
};
