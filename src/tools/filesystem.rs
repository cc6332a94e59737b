//! 只读文件工具：read_file / find_files / list_files / list_directories
//!
//! 都基于 SafeFs，参数用 schemars 生成 schema 并经 parse_args 校验。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::{parse_args, schema_value};
use crate::tools::{SafeFs, Tool, ToolOutput};

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadFileArgs {
    /// 相对工作根目录的文件路径
    path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct FindFilesArgs {
    /// glob 模式，如 `src/**/*.rs`
    pattern: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListArgs {
    /// 目录路径，默认工作根目录
    #[serde(default = "default_dir")]
    path: String,
    #[serde(default)]
    recursive: bool,
}

fn default_dir() -> String {
    ".".to_string()
}

pub struct ReadFileTool {
    fs: SafeFs,
}

impl ReadFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file inside the workspace. Lines are returned numbered from 1."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<ReadFileArgs>()
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let args: ReadFileArgs = match parse_args(self.name(), args) {
            Ok(a) => a,
            Err(e) => return e.into(),
        };
        tracing::info!(path = %args.path, "read_file tool execute");
        match self.fs.read_file(&args.path) {
            Ok(content) => {
                let numbered = content
                    .lines()
                    .enumerate()
                    .map(|(i, line)| format!("{:>5} | {line}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n");
                ToolOutput::with_data(
                    format!("Read {} ({} lines)", args.path, content.lines().count()),
                    serde_json::json!({ "path": args.path, "content": numbered }),
                )
            }
            Err(e) => e.into(),
        }
    }
}

pub struct FindFilesTool {
    fs: SafeFs,
}

impl FindFilesTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for FindFilesTool {
    fn name(&self) -> &str {
        "find_files"
    }

    fn description(&self) -> &str {
        "Find workspace files whose relative path matches a glob pattern."
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<FindFilesArgs>()
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let args: FindFilesArgs = match parse_args(self.name(), args) {
            Ok(a) => a,
            Err(e) => return e.into(),
        };
        match self.fs.find_files(&args.pattern) {
            Ok(files) => ToolOutput::with_data(
                format!("{} file(s) match {}", files.len(), args.pattern),
                serde_json::json!({ "files": files }),
            ),
            Err(e) => e.into(),
        }
    }
}

/// list_files 与 list_directories 共用参数与实现，只是过滤条件不同
pub struct ListTool {
    fs: SafeFs,
    directories: bool,
}

impl ListTool {
    pub fn files(fs: SafeFs) -> Self {
        Self {
            fs,
            directories: false,
        }
    }

    pub fn directories(fs: SafeFs) -> Self {
        Self {
            fs,
            directories: true,
        }
    }
}

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> &str {
        if self.directories {
            "list_directories"
        } else {
            "list_files"
        }
    }

    fn description(&self) -> &str {
        if self.directories {
            "List directories under a workspace path (ignored paths are skipped)."
        } else {
            "List files under a workspace path (ignored paths are skipped)."
        }
    }

    fn parameters_schema(&self) -> Value {
        schema_value::<ListArgs>()
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let args: ListArgs = match parse_args(self.name(), args) {
            Ok(a) => a,
            Err(e) => return e.into(),
        };
        let listed = if self.directories {
            self.fs.list_directories(&args.path, args.recursive)
        } else {
            self.fs.list_files(&args.path, args.recursive)
        };
        match listed {
            Ok(entries) => ToolOutput::with_data(
                format!("{} entr(ies) under {}", entries.len(), args.path),
                serde_json::json!({ "entries": entries }),
            ),
            Err(e) => e.into(),
        }
    }
}
