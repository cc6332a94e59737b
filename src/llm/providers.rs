//! Provider 预设：OpenAI / DeepSeek / Ollama 的默认端点、模型与 Key 环境变量
//!
//! - DeepSeek: https://api.deepseek.com，默认模型 deepseek-chat
//! - Ollama: 本地 OpenAI 兼容端点 http://localhost:11434/v1，无需 Key

use std::time::Duration;

use crate::config::{LlmTimeoutsSection, ProviderConfig};
use crate::llm::openai::{OpenAiSettings, OPENAI_BASE_URL};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

struct Preset {
    base_url: &'static str,
    model: &'static str,
    key_env: Option<&'static str>,
}

fn preset(kind: &str) -> Option<Preset> {
    match kind {
        "openai" => Some(Preset {
            base_url: OPENAI_BASE_URL,
            model: "gpt-4o-mini",
            key_env: Some("OPENAI_API_KEY"),
        }),
        "deepseek" => Some(Preset {
            base_url: DEEPSEEK_BASE_URL,
            model: DEEPSEEK_CHAT,
            key_env: Some("DEEPSEEK_API_KEY"),
        }),
        "ollama" => Some(Preset {
            base_url: OLLAMA_BASE_URL,
            model: "qwen2.5-coder",
            key_env: None,
        }),
        _ => None,
    }
}

/// 按 provider 配置合成客户端参数；kind 不是已知的 OpenAI 兼容类型时返回 None
pub fn openai_compatible_settings(
    cfg: &ProviderConfig,
    timeouts: &LlmTimeoutsSection,
) -> Option<OpenAiSettings> {
    let kind = cfg.kind();
    let preset = preset(&kind)?;
    let key_env = cfg.api_key_env.as_deref().or(preset.key_env);
    let api_key = key_env.and_then(|name| std::env::var(name).ok());

    Some(OpenAiSettings {
        name: cfg.name.clone(),
        base_url: cfg
            .base_url
            .clone()
            .unwrap_or_else(|| preset.base_url.to_string()),
        model: cfg.model.clone().unwrap_or_else(|| preset.model.to_string()),
        api_key,
        requires_key: key_env.is_some(),
        request_timeout: Duration::from_secs(timeouts.request),
        probe_timeout: Duration::from_secs(timeouts.probe),
    })
}
