//! Hive - Rust 编码智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、会话状态、自动修复循环、错误恢复、会话状态机
//! - **executor**: 按执行顺序运行子任务
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、provider 选择、结构化输出
//! - **memory**: 聊天历史与任务历史持久化
//! - **observability**: tracing 初始化
//! - **planning**: 复杂度评估、任务分解、LLM 分层选择
//! - **prompts**: `@name` 提示模板
//! - **react**: 子任务内的工具调用循环
//! - **tools**: 沙箱文件系统、编辑工具、进程工具与执行器
//! - **ui**: 终端交互
//! - **validation**: 计划执行后的校验

pub mod config;
pub mod core;
pub mod executor;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod planning;
pub mod prompts;
pub mod react;
pub mod tools;
pub mod ui;
pub mod validation;
