//! 工具层：Tool trait 与注册表、执行器（超时 + 审计）、沙箱、文件工具、补丁引擎、进程工具、写入审批

pub mod approval;
pub mod executor;
pub mod filesystem;
pub mod patch;
pub mod process;
pub mod registry;
pub mod sandbox;
pub mod schema;

use std::sync::Arc;

pub use approval::{approval_for_mode, ApprovalHandler, ApprovalRequest, AutoApprove, ConsoleApproval, FixedApproval};
pub use executor::ToolExecutor;
pub use filesystem::{FindFilesTool, ListTool, ReadFileTool};
pub use patch::{EditFileTool, LineEdit, PatchChange, PatchEngine, PatchFileTool, PatchOutcome, WriteFileTool};
pub use process::{run_command, ProcessOutput, RunProcessTool};
pub use registry::{Tool, ToolOutput, ToolRegistry};
pub use sandbox::SafeFs;
pub use schema::{parse_args, tool_call_schema_json};

use crate::config::ToolsSection;

/// 子任务执行使用的固定工具集：
/// read_file、find_files、list_files、list_directories、edit_file、write_file、patch_file、run_process
pub fn task_toolset(
    fs: &SafeFs,
    approval: Arc<dyn ApprovalHandler>,
    tools: &ToolsSection,
) -> ToolExecutor {
    let engine = Arc::new(PatchEngine::new(fs.clone(), approval.clone()));
    let mut registry = ToolRegistry::new();
    registry.register(ReadFileTool::new(fs.clone()));
    registry.register(FindFilesTool::new(fs.clone()));
    registry.register(ListTool::files(fs.clone()));
    registry.register(ListTool::directories(fs.clone()));
    registry.register(EditFileTool::new(engine.clone()));
    registry.register(WriteFileTool::new(engine.clone()));
    registry.register(PatchFileTool::new(engine));
    registry.register(RunProcessTool::new(
        fs.clone(),
        &tools.process.allowed_commands,
        tools.process.timeout_secs,
        approval,
    ));
    ToolExecutor::new(registry, tools.tool_timeout_secs)
}
