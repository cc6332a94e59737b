//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Ollama / Mock）实现 LlmClient：complete（非流式）、complete_stream（流式 Token）、
//! is_available（供 provider 回退搜索探测）。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use thiserror::Error;

use crate::memory::Message;

/// LLM 后端错误
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("empty response")]
    EmptyResponse,
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// provider 名（日志与诊断用）
    fn name(&self) -> &str;

    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 流式完成，默认退化为一次性返回完整内容
    async fn complete_stream(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let content = self.complete(messages).await?;
        Ok(Box::pin(stream::iter(vec![Ok(content)])))
    }

    /// 可用性探测
    async fn is_available(&self) -> bool {
        true
    }
}

/// 单轮生成：可选 system + 用户输入
pub async fn generate(
    llm: &dyn LlmClient,
    system_prompt: Option<&str>,
    user_input: &str,
) -> Result<String, LlmError> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(user_input));
    llm.complete(&messages).await
}

/// 流式生成：每个 chunk 回调一次，返回拼接后的完整文本
pub async fn generate_stream(
    llm: &dyn LlmClient,
    messages: &[Message],
    on_chunk: &mut (dyn FnMut(&str) + Send),
) -> Result<String, LlmError> {
    let mut stream = llm.complete_stream(messages).await?;
    let mut full = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        on_chunk(&chunk);
        full.push_str(&chunk);
    }
    Ok(full)
}
