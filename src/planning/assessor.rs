//! 复杂度评估：输入因子 -> 得分 / 等级
//!
//! 每个因子按各自范围归一化到 [0,100]，再按权重加权求和（权重和为 1）；
//! 历史成功率越高，得分按 risk_discount 比例下调。纯函数，无副作用。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{FactorWeights, PlanningSection};
use crate::core::AgentError;
use crate::planning::ComplexityLevel;

/// 评估输入（小整数因子 + 可选历史成功率）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComplexityFactors {
    /// 任务类型：1=文档/配置 … 5=新系统/架构
    pub task_type: u32,
    /// 影响范围：涉及的文件/模块数量级，1-10
    pub scope_size: u32,
    /// 外部依赖与模块间耦合数量，0-10
    pub dependencies_count: u32,
    /// 技术难度：1-5
    pub technology_complexity: u32,
    /// 同类任务历史成功率，[0,1]
    pub prior_success_rate: Option<f64>,
}

/// 因子的取值范围，超出部分截断
#[derive(Debug, Clone, Copy)]
pub struct FactorRange {
    pub min: u32,
    pub max: u32,
}

impl FactorRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    fn normalize(&self, value: u32) -> f64 {
        if self.max <= self.min {
            return 0.0;
        }
        let clamped = value.clamp(self.min, self.max);
        f64::from(clamped - self.min) / f64::from(self.max - self.min) * 100.0
    }
}

/// 单个因子的贡献
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorContribution {
    pub factor: &'static str,
    /// 归一化后的值（0-100）
    pub normalized: f64,
    pub weight: f64,
    /// normalized * weight
    pub contribution: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplexityAssessment {
    pub level: ComplexityLevel,
    pub score: f64,
    pub contributions: Vec<FactorContribution>,
    pub explanation: String,
}

#[derive(Debug, Clone)]
pub struct AssessorConfig {
    pub weights: FactorWeights,
    pub medium_threshold: f64,
    pub high_threshold: f64,
    pub risk_discount: f64,
    pub task_type_range: FactorRange,
    pub scope_range: FactorRange,
    pub dependencies_range: FactorRange,
    pub technology_range: FactorRange,
}

impl Default for AssessorConfig {
    fn default() -> Self {
        Self::from_section(&PlanningSection::default())
    }
}

impl AssessorConfig {
    pub fn from_section(section: &PlanningSection) -> Self {
        Self {
            weights: section.weights,
            medium_threshold: section.medium_threshold,
            high_threshold: section.high_threshold,
            risk_discount: section.risk_discount,
            task_type_range: FactorRange::new(1, 5),
            scope_range: FactorRange::new(1, 10),
            dependencies_range: FactorRange::new(0, 10),
            technology_range: FactorRange::new(1, 5),
        }
    }

    pub fn with_thresholds(mut self, medium: f64, high: f64) -> Self {
        self.medium_threshold = medium;
        self.high_threshold = high;
        self
    }
}

/// 复杂度评估器
#[derive(Debug, Clone)]
pub struct ComplexityAssessor {
    config: AssessorConfig,
}

impl ComplexityAssessor {
    /// 校验权重和阈值后创建
    pub fn new(config: AssessorConfig) -> Result<Self, AgentError> {
        let sum = config.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(AgentError::Configuration(format!(
                "complexity weights must sum to 1, got {sum:.4}"
            )));
        }
        let w = &config.weights;
        if [w.task_type, w.scope_size, w.dependencies, w.technology]
            .iter()
            .any(|v| *v < 0.0)
        {
            return Err(AgentError::Configuration(
                "complexity weights must be non-negative".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&config.medium_threshold)
            || !(0.0..=100.0).contains(&config.high_threshold)
            || config.medium_threshold > config.high_threshold
        {
            return Err(AgentError::Configuration(format!(
                "invalid thresholds: medium={} high={}",
                config.medium_threshold, config.high_threshold
            )));
        }
        if !(0.0..=1.0).contains(&config.risk_discount) {
            return Err(AgentError::Configuration(format!(
                "risk_discount must be within [0,1], got {}",
                config.risk_discount
            )));
        }
        Ok(Self { config })
    }

    pub fn assess(&self, factors: &ComplexityFactors) -> ComplexityAssessment {
        let c = &self.config;
        let contributions = vec![
            contribution("task_type", c.task_type_range.normalize(factors.task_type), c.weights.task_type),
            contribution("scope_size", c.scope_range.normalize(factors.scope_size), c.weights.scope_size),
            contribution(
                "dependencies_count",
                c.dependencies_range.normalize(factors.dependencies_count),
                c.weights.dependencies,
            ),
            contribution(
                "technology_complexity",
                c.technology_range.normalize(factors.technology_complexity),
                c.weights.technology,
            ),
        ];

        let raw: f64 = contributions.iter().map(|f| f.contribution).sum();
        let rate = factors
            .prior_success_rate
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(0.0, 1.0));
        let discount = rate.map(|r| r * c.risk_discount).unwrap_or(0.0);
        let score = (raw * (1.0 - discount)).clamp(0.0, 100.0);
        let level = self.level_for(score);

        let top = contributions
            .iter()
            .max_by(|a, b| a.contribution.total_cmp(&b.contribution))
            .map(|f| f.factor)
            .unwrap_or("none");
        let mut explanation = format!(
            "score {:.1} -> {} (medium >= {}, high >= {}); largest contributor: {}",
            score, level, c.medium_threshold, c.high_threshold, top
        );
        if let Some(r) = rate {
            explanation.push_str(&format!(
                "; prior success rate {:.0}% lowered the score by {:.0}%",
                r * 100.0,
                discount * 100.0
            ));
        }

        ComplexityAssessment {
            level,
            score,
            contributions,
            explanation,
        }
    }

    /// 按阈值映射等级（对得分单调）
    pub fn level_for(&self, score: f64) -> ComplexityLevel {
        if score >= self.config.high_threshold {
            ComplexityLevel::High
        } else if score >= self.config.medium_threshold {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::Low
        }
    }
}

fn contribution(factor: &'static str, normalized: f64, weight: f64) -> FactorContribution {
    FactorContribution {
        factor,
        normalized,
        weight,
        contribution: normalized * weight,
    }
}

/// 无 LLM 或结构化输出失败时的关键词启发式估计
pub fn heuristic_factors(request: &str) -> ComplexityFactors {
    let lower = request.to_lowercase();
    let hits = |words: &[&str]| words.iter().filter(|w| lower.contains(*w)).count() as u32;

    let task_type = if hits(&["system", "architecture", "framework", "platform", "service"]) > 0 {
        5
    } else if hits(&["implement", "build", "create", "add", "feature"]) > 0 {
        3
    } else if hits(&["fix", "bug", "refactor", "rename"]) > 0 {
        2
    } else {
        1
    };
    let words = request.split_whitespace().count() as u32;
    let scope_size = (1 + words / 8 + hits(&["all", "every", "across", "entire", "multiple"]) * 2).min(10);
    let dependencies_count = hits(&[
        "database", "api", "http", "auth", "queue", "cache", "integration", "oauth", "token",
    ]) * 2;
    let technology_complexity = (1
        + hits(&[
            "authentication", "concurren", "async", "distributed", "crypto", "security", "parser",
            "compiler", "performance",
        ]))
    .min(5);

    ComplexityFactors {
        task_type,
        scope_size,
        dependencies_count: dependencies_count.min(10),
        technology_complexity,
        prior_success_rate: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(t: u32, s: u32, d: u32, tech: u32, rate: Option<f64>) -> ComplexityFactors {
        ComplexityFactors {
            task_type: t,
            scope_size: s,
            dependencies_count: d,
            technology_complexity: tech,
            prior_success_rate: rate,
        }
    }

    #[test]
    fn test_score_within_bounds_for_extremes() {
        let assessor = ComplexityAssessor::new(AssessorConfig::default()).unwrap();
        for f in [
            factors(0, 0, 0, 0, None),
            factors(1, 1, 0, 1, None),
            factors(5, 10, 10, 5, None),
            factors(99, 99, 99, 99, Some(0.0)),
            factors(99, 99, 99, 99, Some(7.0)),
            factors(3, 4, 2, 2, Some(f64::NAN)),
        ] {
            let a = assessor.assess(&f);
            assert!((0.0..=100.0).contains(&a.score), "{} out of range", a.score);
        }
        assert!((assessor.assess(&factors(5, 10, 10, 5, None)).score - 100.0).abs() < 1e-9);
        assert_eq!(assessor.assess(&factors(1, 1, 0, 1, None)).score, 0.0);
    }

    #[test]
    fn test_success_rate_lowers_score() {
        let assessor = ComplexityAssessor::new(AssessorConfig::default()).unwrap();
        let base = assessor.assess(&factors(4, 6, 5, 3, None)).score;
        let low_rate = assessor.assess(&factors(4, 6, 5, 3, Some(0.2))).score;
        let high_rate = assessor.assess(&factors(4, 6, 5, 3, Some(0.9))).score;
        assert!(low_rate < base);
        assert!(high_rate < low_rate);
    }

    #[test]
    fn test_levels_monotonic_in_score() {
        let assessor =
            ComplexityAssessor::new(AssessorConfig::default().with_thresholds(30.0, 60.0)).unwrap();
        let rank = |l: ComplexityLevel| match l {
            ComplexityLevel::Low => 0,
            ComplexityLevel::Medium => 1,
            ComplexityLevel::High => 2,
        };
        let mut prev = 0;
        for s in 0..=100 {
            let r = rank(assessor.level_for(f64::from(s)));
            assert!(r >= prev);
            prev = r;
        }
        assert_eq!(assessor.level_for(29.9), ComplexityLevel::Low);
        assert_eq!(assessor.level_for(30.0), ComplexityLevel::Medium);
        assert_eq!(assessor.level_for(60.0), ComplexityLevel::High);
    }

    #[test]
    fn test_contributions_sum_to_raw_score() {
        let assessor = ComplexityAssessor::new(AssessorConfig::default()).unwrap();
        let a = assessor.assess(&factors(3, 5, 4, 2, None));
        let sum: f64 = a.contributions.iter().map(|c| c.contribution).sum();
        assert!((sum - a.score).abs() < 1e-9);
        assert_eq!(a.contributions.len(), 4);
        assert!(a.explanation.contains(&a.level.to_string()));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut cfg = AssessorConfig::default();
        cfg.weights.task_type = 0.9;
        assert!(matches!(
            ComplexityAssessor::new(cfg),
            Err(AgentError::Configuration(_))
        ));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let cfg = AssessorConfig::default().with_thresholds(80.0, 20.0);
        assert!(ComplexityAssessor::new(cfg).is_err());
    }

    #[test]
    fn test_heuristic_ranks_system_above_typo_fix() {
        let assessor = ComplexityAssessor::new(AssessorConfig::default()).unwrap();
        let big = assessor.assess(&heuristic_factors(
            "Implement a user authentication system with OAuth, token refresh and a database",
        ));
        let small = assessor.assess(&heuristic_factors("fix a typo in README"));
        assert!(big.score > small.score);
    }
}
