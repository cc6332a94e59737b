//! 记忆层：对话消息、有上限的聊天历史、历史与任务持久化

pub mod conversation;
pub mod persistence;

pub use conversation::{ChatEntry, ChatHistory, Message, Role};
pub use persistence::HistoryStore;
