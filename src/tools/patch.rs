//! 补丁 / 编辑引擎
//!
//! - 行区间编辑：校验起止行号与两端行内容完全一致后替换闭区间 [start, end]
//! - 内容补丁：按顺序在「当前」文本中查找每个 old_content 并替换，全部命中才写盘
//!
//! 写盘前都要经过 ApprovalHandler；拒绝时返回 Canceled，文件不动。换行风格（LF / CRLF）与末尾换行保持原样。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{AgentError, FieldError};
use crate::tools::approval::{ApprovalHandler, ApprovalRequest};
use crate::tools::schema::{parse_args, schema_value};
use crate::tools::{SafeFs, Tool, ToolOutput};

/// 行区间编辑请求（行号从 1 开始，闭区间）
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LineEdit {
    pub path: String,
    pub start_line: usize,
    /// start_line 处当前的完整内容
    pub start_content: String,
    pub end_line: usize,
    /// end_line 处当前的完整内容
    pub end_content: String,
    /// 替换整个区间的新内容，可以多行或为空
    pub new_content: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PatchChange {
    /// 文件中逐字存在的原文（可多行）
    pub old_content: String,
    pub new_content: String,
}

impl PatchChange {
    pub fn new(old_content: impl Into<String>, new_content: impl Into<String>) -> Self {
        Self {
            old_content: old_content.into(),
            new_content: new_content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied {
        path: String,
        changes_applied: usize,
        line_count: usize,
    },
    Canceled {
        path: String,
    },
}

impl From<PatchOutcome> for ToolOutput {
    fn from(outcome: PatchOutcome) -> Self {
        match outcome {
            PatchOutcome::Applied {
                path,
                changes_applied,
                line_count,
            } => ToolOutput::with_data(
                format!("Updated {path}"),
                serde_json::json!({
                    "path": path,
                    "changesApplied": changes_applied,
                    "lineCount": line_count,
                }),
            ),
            PatchOutcome::Canceled { path } => {
                ToolOutput::canceled(format!("Change to {path} was not approved"))
            }
        }
    }
}

pub struct PatchEngine {
    fs: SafeFs,
    approval: Arc<dyn ApprovalHandler>,
}

impl PatchEngine {
    pub fn new(fs: SafeFs, approval: Arc<dyn ApprovalHandler>) -> Self {
        Self { fs, approval }
    }

    pub async fn edit_lines(&self, edit: &LineEdit) -> Result<PatchOutcome, AgentError> {
        let text = self.read_existing(&edit.path)?;
        // 每行连同自己的换行符，区间外的行原样写回
        let lines: Vec<&str> = text.split_inclusive('\n').collect();

        let mut range_errors = Vec::new();
        if edit.start_line < 1 {
            range_errors.push(FieldError::new("start_line", "must be >= 1"));
        }
        if edit.end_line < edit.start_line {
            range_errors.push(FieldError::new("end_line", "must be >= start_line"));
        }
        if edit.end_line > lines.len() {
            range_errors.push(FieldError::new(
                "end_line",
                format!("file has only {} lines", lines.len()),
            ));
        }
        if !range_errors.is_empty() {
            return Err(AgentError::Validation {
                tool: "edit_file".to_string(),
                errors: range_errors,
            });
        }

        for (line_no, expected) in [
            (edit.start_line, &edit.start_content),
            (edit.end_line, &edit.end_content),
        ] {
            let (actual, _) = split_eol(lines[line_no - 1]);
            if actual != expected.trim_end_matches(['\r', '\n']) {
                return Err(AgentError::ContentMismatch {
                    path: edit.path.clone(),
                    detail: format!("line {line_no} is {actual:?}, expected {expected:?}"),
                });
            }
        }

        // 新内容沿用被替换末行的换行符；末行没有换行符时内部换行按文件主流换行符
        let (_, tail_eol) = split_eol(lines[edit.end_line - 1]);
        let inner_eol = if tail_eol.is_empty() { line_ending(&text) } else { tail_eol };
        let replacement: Vec<&str> = edit.new_content.lines().collect();

        let mut new_text = String::with_capacity(text.len() + edit.new_content.len());
        lines[..edit.start_line - 1].iter().for_each(|l| new_text.push_str(l));
        for (i, line) in replacement.iter().enumerate() {
            new_text.push_str(line);
            new_text.push_str(if i + 1 == replacement.len() { tail_eol } else { inner_eol });
        }
        lines[edit.end_line..].iter().for_each(|l| new_text.push_str(l));
        let line_count = edit.start_line - 1 + replacement.len() + (lines.len() - edit.end_line);

        let summary = format!(
            "Replace lines {}-{} with {} line(s)",
            edit.start_line,
            edit.end_line,
            replacement.len()
        );
        self.commit("edit_file", &edit.path, &summary, &new_text, 1, line_count)
            .await
    }

    /// 全部 old_content 命中才写盘；后一个变更在前一个变更之后的文本上查找
    pub async fn apply_patch(
        &self,
        path: &str,
        changes: &[PatchChange],
    ) -> Result<PatchOutcome, AgentError> {
        if changes.is_empty() {
            return Err(AgentError::Validation {
                tool: "patch_file".to_string(),
                errors: vec![FieldError::new("changes", "at least one change is required")],
            });
        }
        let text = self.read_existing(path)?;
        let eol = line_ending(&text);

        let mut buffer = text.clone();
        for (i, change) in changes.iter().enumerate() {
            if change.old_content.is_empty() {
                return Err(AgentError::Validation {
                    tool: "patch_file".to_string(),
                    errors: vec![FieldError::new(
                        format!("changes[{i}].old_content"),
                        "must not be empty",
                    )],
                });
            }
            let old = with_line_ending(&change.old_content, eol);
            let new = with_line_ending(&change.new_content, eol);
            let Some(at) = buffer.find(&old) else {
                return Err(AgentError::ContentMismatch {
                    path: path.to_string(),
                    detail: format!("change {} old_content not found", i + 1),
                });
            };
            buffer.replace_range(at..at + old.len(), &new);
        }

        let line_count = buffer.lines().count();
        let summary = format!("Apply {} change(s)", changes.len());
        self.commit("patch_file", path, &summary, &buffer, changes.len(), line_count)
            .await
    }

    /// 新建或覆盖文件
    pub async fn write_file(&self, path: &str, content: &str) -> Result<PatchOutcome, AgentError> {
        let resolved = self.fs.resolve(path)?;
        let summary = if resolved.exists() {
            "Overwrite file"
        } else {
            "Create file"
        };
        self.commit("write_file", path, summary, content, 1, content.lines().count())
            .await
    }

    fn read_existing(&self, path: &str) -> Result<String, AgentError> {
        let resolved = self.fs.resolve(path)?;
        if !resolved.is_file() {
            return Err(AgentError::Execution(format!("File not found: {path}")));
        }
        self.fs.read_file(path)
    }

    async fn commit(
        &self,
        tool: &str,
        path: &str,
        summary: &str,
        content: &str,
        changes_applied: usize,
        line_count: usize,
    ) -> Result<PatchOutcome, AgentError> {
        let request = ApprovalRequest::new(tool, path, summary, content);
        if !self.approval.approve(&request).await {
            tracing::info!(tool, path, "write canceled by user");
            return Ok(PatchOutcome::Canceled {
                path: path.to_string(),
            });
        }
        self.fs.write_file(path, content)?;
        tracing::info!(tool, path, changes_applied, "file updated");
        Ok(PatchOutcome::Applied {
            path: path.to_string(),
            changes_applied,
            line_count,
        })
    }
}

/// 文件中占多数的换行符，持平时取 LF
fn line_ending(text: &str) -> &'static str {
    let crlf = text.matches("\r\n").count();
    let lf = text.matches('\n').count() - crlf;
    if crlf > lf {
        "\r\n"
    } else {
        "\n"
    }
}

/// 拆出行尾换行符（"\r\n"、"\n" 或没有）
fn split_eol(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn with_line_ending(content: &str, eol: &str) -> String {
    if eol == "\r\n" {
        content.replace("\r\n", "\n").replace('\n', "\r\n")
    } else {
        content.to_string()
    }
}

pub struct EditFileTool {
    engine: Arc<PatchEngine>,
}

impl EditFileTool {
    pub fn new(engine: Arc<PatchEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an inclusive line range. start_content and end_content must equal the current \
         text of those lines exactly (read the file first)."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<LineEdit>()
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let edit: LineEdit = match parse_args(self.name(), args) {
            Ok(e) => e,
            Err(e) => return e.into(),
        };
        match self.engine.edit_lines(&edit).await {
            Ok(outcome) => outcome.into(),
            Err(e) => e.into(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PatchFileArgs {
    path: String,
    /// 按顺序应用的变更
    changes: Vec<PatchChange>,
}

pub struct PatchFileTool {
    engine: Arc<PatchEngine>,
}

impl PatchFileTool {
    pub fn new(engine: Arc<PatchEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    fn description(&self) -> &str {
        "Apply ordered {old_content, new_content} replacements located by exact text. \
         If any old_content is missing nothing is written."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<PatchFileArgs>()
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let args: PatchFileArgs = match parse_args(self.name(), args) {
            Ok(a) => a,
            Err(e) => return e.into(),
        };
        match self.engine.apply_patch(&args.path, &args.changes).await {
            Ok(outcome) => outcome.into(),
            Err(e) => e.into(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteFileArgs {
    path: String,
    content: String,
}

pub struct WriteFileTool {
    engine: Arc<PatchEngine>,
}

impl WriteFileTool {
    pub fn new(engine: Arc<PatchEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create a file or overwrite it with the given content."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<WriteFileArgs>()
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let args: WriteFileArgs = match parse_args(self.name(), args) {
            Ok(a) => a,
            Err(e) => return e.into(),
        };
        match self.engine.write_file(&args.path, &args.content).await {
            Ok(outcome) => outcome.into(),
            Err(e) => e.into(),
        }
    }
}
