//! 执行层：按依赖顺序执行子任务

pub mod task_executor;

pub use task_executor::{completion_summary, ExecutionReport, TaskExecutor};
