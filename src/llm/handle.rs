//! 分层 LLM 句柄：按 LOCAL / REMOTE / HYBRID 解析实际客户端

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::planning::LlmTier;

#[derive(Clone)]
pub struct LlmHandle {
    default: Arc<dyn LlmClient>,
    local: Option<Arc<dyn LlmClient>>,
    remote: Option<Arc<dyn LlmClient>>,
}

impl LlmHandle {
    pub fn new(default: Arc<dyn LlmClient>) -> Self {
        Self {
            default,
            local: None,
            remote: None,
        }
    }

    pub fn with_local(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.local = Some(client);
        self
    }

    pub fn with_remote(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.remote = Some(client);
        self
    }

    pub fn default_client(&self) -> Arc<dyn LlmClient> {
        self.default.clone()
    }

    /// HYBRID 跟随会话选出的分层；会话分层本身也是 HYBRID（或未选）时优先 REMOTE，其次 LOCAL
    pub fn resolve(&self, tier: LlmTier, session_tier: Option<LlmTier>) -> Arc<dyn LlmClient> {
        match tier {
            LlmTier::Local => self.local.clone().unwrap_or_else(|| self.default.clone()),
            LlmTier::Remote => self.remote.clone().unwrap_or_else(|| self.default.clone()),
            LlmTier::Hybrid => match session_tier {
                Some(LlmTier::Local) => self.resolve(LlmTier::Local, None),
                Some(LlmTier::Remote) => self.resolve(LlmTier::Remote, None),
                _ => self
                    .remote
                    .clone()
                    .or_else(|| self.local.clone())
                    .unwrap_or_else(|| self.default.clone()),
            },
        }
    }
}

impl std::fmt::Debug for LlmHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmHandle")
            .field("default", &self.default.name())
            .field("local", &self.local.as_ref().map(|c| c.name().to_string()))
            .field("remote", &self.remote.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}
