//! run_process：白名单命令，禁止危险子串，工作目录固定为沙箱根
//!
//! 仅允许配置中的命令名（首词，如 cargo、npm）；按 argv 直接执行，不经过 shell。
//! 每个像路径的参数都经 SafeFs 校验（绝对路径、`~`、`..`、指向根外的符号链接都拒绝），执行前需审批。
//! 校验命令（[validation].command 由用户配置）走 run_command，仍通过 sh -c。

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::core::AgentError;
use crate::tools::approval::{ApprovalHandler, ApprovalRequest};
use crate::tools::schema::{parse_args, schema_value};
use crate::tools::{SafeFs, Tool, ToolOutput};

/// 不经过 shell 执行，这些字符没有合法用途
const SHELL_META: &[char] = &[';', '|', '&', '>', '<', '$', '`', '\'', '"', '\\', '\n', '\r', '(', ')'];

/// 即使命令在白名单里，也不允许包含这些子串
const FORBIDDEN_SUBSTR: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r",
    "wget ",
    "curl | sh",
    "chmod 777",
    "chmod +s",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    "..",
    ":(){ :|:& };:",
];

const MAX_OUTPUT_CHARS: usize = 8_000;

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// 在 cwd 中通过 sh -c / cmd /C 执行可信命令行（校验命令），超时返回 ToolTimeout
pub async fn run_command(
    command: &str,
    cwd: &Path,
    timeout: Duration,
) -> Result<ProcessOutput, AgentError> {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    };
    cmd.current_dir(cwd);
    collect_output(cmd, command, timeout).await
}

/// 不经过 shell，直接以 argv 执行
pub async fn run_argv(
    argv: &[String],
    cwd: &Path,
    timeout: Duration,
) -> Result<ProcessOutput, AgentError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| AgentError::Execution("empty command".to_string()))?;
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(cwd);
    collect_output(cmd, &argv.join(" "), timeout).await
}

async fn collect_output(
    mut cmd: Command,
    label: &str,
    timeout: Duration,
) -> Result<ProcessOutput, AgentError> {
    cmd.kill_on_drop(true);
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| AgentError::ToolTimeout(format!("{label} exceeded {}s", timeout.as_secs())))?
        .map_err(|e| AgentError::Execution(format!("Failed to spawn {label}: {e}")))?;

    Ok(ProcessOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: truncate(&String::from_utf8_lossy(&output.stdout)),
        stderr: truncate(&String::from_utf8_lossy(&output.stderr)),
    })
}

fn truncate(s: &str) -> String {
    if s.chars().count() > MAX_OUTPUT_CHARS {
        let tail: String = s
            .chars()
            .rev()
            .take(MAX_OUTPUT_CHARS)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...(truncated)\n{tail}")
    } else {
        s.to_string()
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RunProcessArgs {
    /// 命令与参数，空白分隔；首词必须在白名单中，不支持 shell 语法
    command: String,
}

pub struct RunProcessTool {
    fs: SafeFs,
    allowed_commands: HashSet<String>,
    timeout: Duration,
    approval: Arc<dyn ApprovalHandler>,
}

impl RunProcessTool {
    pub fn new(
        fs: SafeFs,
        allowed_commands: &[String],
        timeout_secs: u64,
        approval: Arc<dyn ApprovalHandler>,
    ) -> Self {
        Self {
            fs,
            allowed_commands: allowed_commands.iter().map(|s| s.to_lowercase()).collect(),
            timeout: Duration::from_secs(timeout_secs),
            approval,
        }
    }

    /// 校验通过后返回 argv
    fn check_allowed(&self, raw: &str) -> Result<Vec<String>, String> {
        if let Some(c) = raw.chars().find(|c| SHELL_META.contains(c)) {
            return Err(format!("Shell syntax is not supported: '{c}'"));
        }
        let lower = raw.to_lowercase();
        if let Some(forbidden) = FORBIDDEN_SUBSTR.iter().find(|f| lower.contains(*f)) {
            return Err(format!("Forbidden pattern: {forbidden}"));
        }
        let argv: Vec<String> = raw.split_whitespace().map(String::from).collect();
        let Some(name) = argv.first() else {
            return Err("Empty command".to_string());
        };
        if name.contains(['/', '\\']) || !self.allowed_commands.contains(&name.to_lowercase()) {
            return Err(format!("Command '{name}' not in allowlist"));
        }
        for arg in &argv[1..] {
            if let Some(path) = path_operand(arg) {
                self.check_path(path)?;
            }
        }
        Ok(argv)
    }

    fn check_path(&self, path: &str) -> Result<(), String> {
        if path.starts_with('~') {
            return Err(format!("Path outside workspace: {path}"));
        }
        match self.fs.resolve(path) {
            Ok(_) => Ok(()),
            Err(_) => Err(format!("Path outside workspace: {path}")),
        }
    }
}

/// 参数中可能是路径的部分：普通参数本身、`--flag=value` 的 value、`-I/x` 这类粘连值中从 `/` 开始的部分
fn path_operand(arg: &str) -> Option<&str> {
    if !arg.starts_with('-') {
        return Some(arg);
    }
    if let Some((_, value)) = arg.split_once('=') {
        return (!value.is_empty()).then_some(value);
    }
    arg.find(['/', '~']).map(|i| &arg[i..])
}

#[async_trait]
impl Tool for RunProcessTool {
    fn name(&self) -> &str {
        "run_process"
    }

    fn description(&self) -> &str {
        "Run an allowlisted command (e.g. a build or test command) in the workspace root. \
         Arguments are passed directly, without a shell; paths must stay inside the workspace."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<RunProcessArgs>()
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let args: RunProcessArgs = match parse_args(self.name(), args) {
            Ok(a) => a,
            Err(e) => return e.into(),
        };
        let command = args.command.trim();
        let argv = match self.check_allowed(command) {
            Ok(argv) => argv,
            Err(reason) => return ToolOutput::error(reason),
        };
        let request = ApprovalRequest::new(self.name(), ".", format!("Run `{command}`"), command);
        if !self.approval.approve(&request).await {
            return ToolOutput::canceled(format!("Running `{command}` was not approved"));
        }
        tracing::info!(command = %command, "run_process tool execute");

        match run_argv(&argv, self.fs.root(), self.timeout).await {
            Ok(out) => {
                let data = serde_json::json!({
                    "exitCode": out.exit_code,
                    "stdout": out.stdout,
                    "stderr": out.stderr,
                });
                if out.success {
                    ToolOutput::with_data(format!("{command} succeeded"), data)
                } else {
                    ToolOutput::Error {
                        message: format!("{command} exited with {:?}: {}", out.exit_code, out.combined()),
                        errors: Vec::new(),
                    }
                }
            }
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessSection;
    use crate::tools::approval::FixedApproval;
    use crate::tools::AutoApprove;
    use tempfile::TempDir;

    fn tool_with(dir: &TempDir, allowed: &[&str], approval: Arc<dyn ApprovalHandler>) -> RunProcessTool {
        let allowed: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
        RunProcessTool::new(SafeFs::new(dir.path()).unwrap(), &allowed, 10, approval)
    }

    fn tool(dir: &TempDir) -> RunProcessTool {
        tool_with(dir, &["echo", "ls", "cat", "touch"], Arc::new(AutoApprove))
    }

    #[test]
    fn test_allowlist_and_forbidden_patterns() {
        let dir = TempDir::new().unwrap();
        let t = tool(&dir);
        assert_eq!(t.check_allowed("echo hi").unwrap(), vec!["echo", "hi"]);
        assert!(t.check_allowed("curl http://x").is_err());
        assert!(t.check_allowed("ls ..").is_err());
        assert!(t.check_allowed("echo x; rm -rf /").is_err());
        assert!(t.check_allowed("   ").is_err());
        assert!(t.check_allowed("/bin/ls").is_err());
    }

    #[test]
    fn test_shell_syntax_and_outside_paths_are_rejected() {
        let dir = TempDir::new().unwrap();
        let t = tool(&dir);
        for command in [
            "echo hi > out.txt",
            "echo hi | cat",
            "echo $HOME",
            "echo `id`",
            "cat a && cat b",
            "cat /etc/passwd",
            "cat ~/.ssh/id_rsa",
            "ls -l --color=/tmp",
            "cat -n/etc/hosts",
        ] {
            assert!(t.check_allowed(command).is_err(), "accepted: {command}");
        }
        assert!(t.check_allowed("ls -la src").is_ok());
        let inside = dir.path().canonicalize().unwrap().join("notes.txt");
        assert!(t.check_allowed(&format!("cat {}", inside.display())).is_ok());
    }

    #[test]
    fn test_default_allowlist_excludes_readers_and_interpreters() {
        let dir = TempDir::new().unwrap();
        let defaults = ProcessSection::default().allowed_commands;
        let t = RunProcessTool::new(SafeFs::new(dir.path()).unwrap(), &defaults, 10, Arc::new(AutoApprove));
        assert!(t.check_allowed("python3 -c print(1)").is_err());
        assert!(t.check_allowed("cat notes.txt").is_err());
        assert!(t.check_allowed("find . -name x").is_err());
        assert!(t.check_allowed("cargo check").is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cannot_read_or_write_outside_root() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "TOP-SECRET").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let t = tool(&dir);

        let secret = outside.path().join("secret.txt");
        for command in [
            format!("cat {}", secret.display()),
            "cat link/secret.txt".to_string(),
        ] {
            let out = t.execute(serde_json::json!({ "command": command })).await;
            assert_eq!(out.status(), "error", "{command}");
            assert!(!out.to_json().contains("TOP-SECRET"));
        }

        let target = outside.path().join("written.txt");
        for command in [
            format!("touch {}", target.display()),
            "touch link/written.txt".to_string(),
        ] {
            let out = t.execute(serde_json::json!({ "command": command })).await;
            assert_eq!(out.status(), "error", "{command}");
        }
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_workspace_root() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let out = tool(&dir).execute(serde_json::json!({"command": "ls"})).await;
        assert!(out.is_success());
        assert!(out.to_json().contains("marker.txt"));

        let denied = tool_with(&dir, &["ls"], Arc::new(AutoApprove))
            .execute(serde_json::json!({"command": "cat marker.txt"}))
            .await;
        assert_eq!(denied.status(), "error");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_requires_approval() {
        let dir = TempDir::new().unwrap();
        let approval = Arc::new(FixedApproval::deny());
        let t = tool_with(&dir, &["touch"], approval.clone());
        let out = t.execute(serde_json::json!({"command": "touch made.txt"})).await;
        assert_eq!(out.status(), "canceled");
        assert_eq!(approval.requests(), 1);
        assert!(!dir.path().join("made.txt").exists());

        let allowed = Arc::new(FixedApproval::allow());
        let t = tool_with(&dir, &["touch"], allowed.clone());
        assert!(t.execute(serde_json::json!({"command": "touch made.txt"})).await.is_success());
        assert_eq!(allowed.requests(), 1);
        assert!(dir.path().join("made.txt").exists());
    }
}
