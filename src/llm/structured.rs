//! 结构化输出：把 schemars 生成的 JSON Schema 拼进 prompt，解析模型回复为类型化对象
//!
//! 解析失败时带着错误信息重试一次（修复提示），仍失败则返回 Validation 错误。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

use crate::core::{AgentError, FieldError};
use crate::llm::LlmClient;
use crate::memory::Message;

/// 从模型输出中提取 JSON 片段（```json ... ``` 或首个 { 到最后一个 }）
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end >= start).then(|| &trimmed[start..=end])
}

pub async fn generate_structured<T>(llm: &dyn LlmClient, prompt: &str) -> Result<T, AgentError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = serde_json::to_string_pretty(&schema_for!(T))?;
    let mut messages = vec![
        Message::system(format!(
            "Respond with exactly one JSON object that validates against this JSON Schema. \
             Output no prose.\n\n{schema}"
        )),
        Message::user(prompt),
    ];

    let mut last_error = String::new();
    for attempt in 0..2 {
        let output = llm.complete(&messages).await?;
        match extract_json(&output).map(serde_json::from_str::<T>) {
            Some(Ok(value)) => return Ok(value),
            Some(Err(e)) => last_error = e.to_string(),
            None => last_error = "no JSON object found".to_string(),
        }
        tracing::debug!(attempt, error = %last_error, "structured output rejected");
        messages.push(Message::assistant(output));
        messages.push(Message::user(format!(
            "That response was invalid ({last_error}). Reply again with only the JSON object."
        )));
    }

    Err(AgentError::Validation {
        tool: "structured_output".to_string(),
        errors: vec![FieldError::new("response", last_error)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Estimate {
        score: u32,
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(extract_json("Sure: {\"a\":1} done"), Some("{\"a\":1}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[tokio::test]
    async fn test_structured_output_repairs_once() {
        let llm = MockLlmClient::with_responses(["not json", "{\"score\": 7}"]);
        let value: Estimate = generate_structured(&llm, "estimate").await.unwrap();
        assert_eq!(value.score, 7);
        assert_eq!(llm.call_count(), 2);
        assert!(llm.recorded_calls()[0][0].content.contains("JSON Schema"));
    }

    #[tokio::test]
    async fn test_structured_output_gives_up_with_validation_error() {
        let llm = MockLlmClient::with_responses(["nope", "{\"score\": \"high\"}"]);
        let err = generate_structured::<Estimate>(&llm, "estimate").await.unwrap_err();
        assert!(matches!(err, AgentError::Validation { .. }));
    }
}
