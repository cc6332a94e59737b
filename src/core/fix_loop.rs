//! 校验失败后的有界自动修复
//!
//! 每次 FAILED 校验消耗一次尝试；达到上限后计数清零并转人工确认。

use crate::planning::ValidationResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixDecision {
    /// 用修复 prompt 再执行一次
    Retry { prompt: String, attempt: u32 },
    /// 转人工：展示失败信息后回到计划审阅
    ManualFallback { message: String },
}

#[derive(Debug, Clone)]
pub struct FixLoop {
    max_attempts: u32,
    attempts: u32,
}

impl FixLoop {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn on_failure(&mut self, result: &ValidationResult, original_request: &str) -> FixDecision {
        if self.attempts >= self.max_attempts {
            let attempts = self.attempts;
            self.reset();
            return FixDecision::ManualFallback {
                message: format!(
                    "Validation still failing after {attempts} automatic fix attempt(s).\n{}",
                    describe_failure(result)
                ),
            };
        }
        self.attempts += 1;
        FixDecision::Retry {
            prompt: fix_prompt(result, original_request),
            attempt: self.attempts,
        }
    }
}

pub fn describe_failure(result: &ValidationResult) -> String {
    let mut text = format!("Failure: {}", result.message);
    if !result.failed_tasks.is_empty() {
        text.push_str(&format!("\nFailed tasks: {}", result.failed_tasks.join(", ")));
    }
    if !result.suggested_fixes.is_empty() {
        text.push_str("\nSuggested fixes:");
        for fix in &result.suggested_fixes {
            text.push_str(&format!("\n- {fix}"));
        }
    }
    text
}

fn fix_prompt(result: &ValidationResult, original_request: &str) -> String {
    format!(
        "Validation of the previous changes failed. Fix the problems below.\n\n{}\n\n\
         Original request: {original_request}",
        describe_failure(result)
    )
}
