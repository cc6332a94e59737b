//! 对话消息与带时间戳的聊天历史
//!
//! ChatHistory 保留最近 max_entries 条消息，超出时自动剪枝，供 `/save` 与 direct response 上下文使用。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条 LLM 消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// 有上限的有序聊天历史
#[derive(Clone, Debug)]
pub struct ChatHistory {
    entries: Vec<ChatEntry>,
    max_entries: usize,
}

impl ChatHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push(ChatEntry {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        self.prune();
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 最近 n 条转成 LLM 消息
    pub fn recent_messages(&self, n: usize) -> Vec<Message> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries[skip..]
            .iter()
            .map(|e| Message {
                role: e.role.clone(),
                content: e.content.clone(),
            })
            .collect()
    }

    /// 超出上限时丢弃最旧的消息
    fn prune(&mut self) {
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
    }
}
