//! LLM 分层选择：得分 / 标签 -> LOCAL / REMOTE / HYBRID
//!
//! 标签覆盖优先（按传入标签顺序，第一个命中即返回），否则按阈值：
//! score >= remote_threshold -> REMOTE；score >= hybrid_threshold -> HYBRID；否则 LOCAL。

use std::collections::HashMap;

use crate::config::StrategySection;
use crate::planning::{ComplexityLevel, LlmTier};

#[derive(Debug, Clone)]
pub struct LlmStrategySelector {
    remote_threshold: f64,
    hybrid_threshold: f64,
    tag_overrides: HashMap<String, LlmTier>,
}

impl LlmStrategySelector {
    pub fn new(section: &StrategySection) -> Self {
        let mut tag_overrides = HashMap::new();
        for o in &section.tag_overrides {
            // 同名标签以配置中先出现的为准
            tag_overrides.entry(normalize_tag(&o.tag)).or_insert(o.tier);
        }
        Self {
            remote_threshold: section.remote_threshold,
            hybrid_threshold: section.hybrid_threshold,
            tag_overrides,
        }
    }

    /// level 仅用于日志，决策只依赖标签与得分
    pub fn select_llm_type(&self, level: ComplexityLevel, score: f64, tags: &[String]) -> LlmTier {
        if let Some(tier) = self.tag_override(tags) {
            return tier;
        }
        let tier = if score >= self.remote_threshold {
            LlmTier::Remote
        } else if score >= self.hybrid_threshold {
            LlmTier::Hybrid
        } else {
            LlmTier::Local
        };
        tracing::debug!(level = %level, score, tier = %tier, "tier selected by score");
        tier
    }

    /// 没有得分（等级被强制指定）时：标签覆盖优先，否则按等级
    pub fn select_for_level(&self, level: ComplexityLevel, tags: &[String]) -> LlmTier {
        self.tag_override(tags).unwrap_or_else(|| tier_for_level(level))
    }

    fn tag_override(&self, tags: &[String]) -> Option<LlmTier> {
        tags.iter().find_map(|tag| {
            let tier = self.tag_overrides.get(&normalize_tag(tag)).copied()?;
            tracing::debug!(tag = %tag, tier = %tier, "tier selected by tag override");
            Some(tier)
        })
    }
}

impl Default for LlmStrategySelector {
    fn default() -> Self {
        Self::new(&StrategySection::default())
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

/// 仅按等级选择
pub fn tier_for_level(level: ComplexityLevel) -> LlmTier {
    match level {
        ComplexityLevel::High => LlmTier::Remote,
        ComplexityLevel::Medium => LlmTier::Hybrid,
        ComplexityLevel::Low => LlmTier::Local,
    }
}

/// 按等级名选择，无法识别时为 HYBRID
pub fn tier_for_level_name(name: &str) -> LlmTier {
    match name.trim().to_ascii_uppercase().as_str() {
        "HIGH" => LlmTier::Remote,
        "LOW" => LlmTier::Local,
        _ => LlmTier::Hybrid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagOverride;

    fn selector() -> LlmStrategySelector {
        LlmStrategySelector::new(&StrategySection {
            remote_threshold: 70.0,
            hybrid_threshold: 40.0,
            tag_overrides: vec![
                TagOverride::new("security", LlmTier::Remote),
                TagOverride::new("docs", LlmTier::Local),
            ],
        })
    }

    #[test]
    fn test_thresholds() {
        let s = selector();
        assert_eq!(s.select_llm_type(ComplexityLevel::High, 85.0, &[]), LlmTier::Remote);
        assert_eq!(s.select_llm_type(ComplexityLevel::High, 70.0, &[]), LlmTier::Remote);
        assert_eq!(s.select_llm_type(ComplexityLevel::Medium, 40.0, &[]), LlmTier::Hybrid);
        assert_eq!(s.select_llm_type(ComplexityLevel::Low, 39.9, &[]), LlmTier::Local);
    }

    #[test]
    fn test_first_matching_tag_wins() {
        let s = selector();
        let tags = vec!["#Docs".to_string(), "security".to_string()];
        assert_eq!(s.select_llm_type(ComplexityLevel::High, 95.0, &tags), LlmTier::Local);
        let tags = vec!["unrelated".to_string(), "security".to_string(), "docs".to_string()];
        assert_eq!(s.select_llm_type(ComplexityLevel::Low, 5.0, &tags), LlmTier::Remote);
    }

    #[test]
    fn test_level_only_variant() {
        assert_eq!(tier_for_level(ComplexityLevel::High), LlmTier::Remote);
        assert_eq!(tier_for_level(ComplexityLevel::Medium), LlmTier::Hybrid);
        assert_eq!(tier_for_level(ComplexityLevel::Low), LlmTier::Local);
        assert_eq!(tier_for_level_name("unknown"), LlmTier::Hybrid);
        assert_eq!(tier_for_level_name("low"), LlmTier::Local);

        let s = selector();
        assert_eq!(s.select_for_level(ComplexityLevel::High, &[]), LlmTier::Remote);
        assert_eq!(
            s.select_for_level(ComplexityLevel::High, &["docs".to_string()]),
            LlmTier::Local
        );
    }
}
