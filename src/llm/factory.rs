//! Provider 工厂与「首个可用即胜出」选择
//!
//! 工厂按 kind 名注册构造函数；get_best_llm 依次尝试：显式 provider -> 首选 provider -> 按声明顺序的每个已启用 provider，
//! 第一个 is_available 的胜出，全部失败时返回 NoLlmAvailable。

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{LlmSection, LlmTimeoutsSection, ProviderConfig};
use crate::core::AgentError;
use crate::llm::providers::openai_compatible_settings;
use crate::llm::{LlmClient, LlmHandle, MockLlmClient, OpenAiClient};

type Constructor =
    Box<dyn Fn(&ProviderConfig, &LlmTimeoutsSection) -> Result<Arc<dyn LlmClient>, AgentError> + Send + Sync>;

/// 选择请求：显式 provider 与首选 provider（均可空）
#[derive(Debug, Clone, Default)]
pub struct ProviderSelection {
    pub provider_name: Option<String>,
    pub preferred_provider: Option<String>,
}

impl ProviderSelection {
    pub fn from_config(section: &LlmSection) -> Self {
        Self {
            provider_name: section.provider.clone(),
            preferred_provider: section.preferred_provider.clone(),
        }
    }
}

pub struct ProviderFactory {
    constructors: HashMap<String, Constructor>,
}

impl ProviderFactory {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// 注册 openai / deepseek / ollama（OpenAI 兼容）与 mock
    pub fn with_defaults() -> Self {
        let mut factory = Self::empty();
        for kind in ["openai", "deepseek", "ollama"] {
            factory.register(kind, |cfg, timeouts| {
                let settings = openai_compatible_settings(cfg, timeouts).ok_or_else(|| {
                    AgentError::Configuration(format!("no preset for provider '{}'", cfg.name))
                })?;
                Ok(Arc::new(OpenAiClient::new(settings)) as Arc<dyn LlmClient>)
            });
        }
        factory.register("mock", |cfg, _| {
            Ok(Arc::new(MockLlmClient::new().named(cfg.name.clone())) as Arc<dyn LlmClient>)
        });
        factory
    }

    pub fn register<F>(&mut self, kind: &str, constructor: F)
    where
        F: Fn(&ProviderConfig, &LlmTimeoutsSection) -> Result<Arc<dyn LlmClient>, AgentError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(kind.to_lowercase(), Box::new(constructor));
    }

    /// 按 provider 配置创建客户端；未启用或 kind 未注册为 Configuration 错误
    pub fn create(
        &self,
        cfg: &ProviderConfig,
        timeouts: &LlmTimeoutsSection,
    ) -> Result<Arc<dyn LlmClient>, AgentError> {
        if !cfg.enabled {
            return Err(AgentError::Configuration(format!(
                "provider '{}' is disabled",
                cfg.name
            )));
        }
        let kind = cfg.kind();
        let constructor = self.constructors.get(&kind).ok_or_else(|| {
            AgentError::Configuration(format!("unknown provider kind '{}'", kind))
        })?;
        constructor(cfg, timeouts)
    }

    /// 按名称创建并探测可用性
    pub async fn try_provider(
        &self,
        section: &LlmSection,
        name: &str,
    ) -> Result<Arc<dyn LlmClient>, AgentError> {
        let cfg = section.provider_config(name).ok_or_else(|| {
            AgentError::Configuration(format!("provider '{}' is not configured", name))
        })?;
        let client = self.create(cfg, &section.timeouts)?;
        if client.is_available().await {
            Ok(client)
        } else {
            Err(AgentError::Availability(format!(
                "provider '{}' did not respond",
                name
            )))
        }
    }

    pub async fn get_best_llm(
        &self,
        section: &LlmSection,
        selection: &ProviderSelection,
    ) -> Result<Arc<dyn LlmClient>, AgentError> {
        let mut candidates: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !candidates.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                candidates.push(name.to_string());
            }
        };
        if let Some(name) = &selection.provider_name {
            push(name);
        }
        if let Some(name) = &selection.preferred_provider {
            push(name);
        }
        for p in section.providers.iter().filter(|p| p.enabled) {
            push(&p.name);
        }

        let mut failures = Vec::new();
        for name in &candidates {
            match self.try_provider(section, name).await {
                Ok(client) => {
                    tracing::info!(provider = %name, "using LLM provider");
                    return Ok(client);
                }
                Err(e) => {
                    tracing::warn!(provider = %name, error = %e, "provider skipped");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        Err(AgentError::NoLlmAvailable(if failures.is_empty() {
            "no providers configured".to_string()
        } else {
            failures.join("; ")
        }))
    }

    /// 构建分层句柄：LOCAL / REMOTE 按 [llm.tiers] 尝试，不可用时回落到 default
    pub async fn build_handle(&self, section: &LlmSection, default: Arc<dyn LlmClient>) -> LlmHandle {
        let mut handle = LlmHandle::new(default);
        if let Some(name) = &section.tiers.local {
            match self.try_provider(section, name).await {
                Ok(client) => handle = handle.with_local(client),
                Err(e) => tracing::info!(provider = %name, error = %e, "local tier falls back to default"),
            }
        }
        if let Some(name) = &section.tiers.remote {
            match self.try_provider(section, name).await {
                Ok(client) => handle = handle.with_remote(client),
                Err(e) => tracing::info!(provider = %name, error = %e, "remote tier falls back to default"),
            }
        }
        handle
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}
