//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；OpenAI、DeepSeek、Ollama 均走这里，
//! 可用性通过 reqwest 探测 `GET {base}/models`。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI 兼容客户端的构建参数
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// 托管服务需要 Key；本地 Ollama 不需要
    pub requires_key: bool,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
}

/// OpenAI 兼容客户端：持有 Client 与 model 名，complete 时转 Message 为 API 格式并取首条 content
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    settings: OpenAiSettings,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(settings: OpenAiSettings) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(settings.base_url.clone())
            .with_api_key(settings.api_key.clone().unwrap_or_default());
        let http = reqwest::Client::builder()
            .timeout(settings.probe_timeout)
            .build()
            .unwrap_or_default();

        Self {
            client: Client::with_config(config),
            settings,
            http,
        }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages
            .iter()
            .map(|m| {
                let built = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                built.map_err(|e| LlmError::Api(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(self.to_openai_messages(messages)?)
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let timeout_secs = self.settings.request_timeout.as_secs();
        let response = tokio::time::timeout(
            self.settings.request_timeout,
            self.client.chat().create(request),
        )
        .await
        .map_err(|_| LlmError::Timeout(timeout_secs))?
        .map_err(|e| LlmError::Api(e.to_string()))?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                provider = %self.settings.name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or(LlmError::EmptyResponse)
    }

    async fn is_available(&self) -> bool {
        let key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty());
        if self.settings.requires_key && key.is_none() {
            tracing::debug!(provider = %self.settings.name, "no API key configured");
            return false;
        }

        let url = format!("{}/models", self.settings.base_url.trim_end_matches('/'));
        let mut request = self.http.get(&url);
        if let Some(key) = key {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(provider = %self.settings.name, status = %resp.status(), "availability probe rejected");
                false
            }
            Err(e) => {
                tracing::warn!(provider = %self.settings.name, error = %e, "availability probe failed");
                false
            }
        }
    }
}
