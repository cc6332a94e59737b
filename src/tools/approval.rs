//! 写操作与命令执行审批
//!
//! 补丁引擎在写盘前、run_process 在启动进程前调用 ApprovalHandler；返回 false 时结果为 canceled，什么都不做。

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::config::ApprovalMode;

/// 一次待审批的文件写入或命令执行
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub tool: String,
    pub path: String,
    pub summary: String,
    /// 新内容的预览（截断）
    pub preview: String,
}

impl ApprovalRequest {
    pub fn new(
        tool: impl Into<String>,
        path: impl Into<String>,
        summary: impl Into<String>,
        new_content: &str,
    ) -> Self {
        let preview: String = new_content.lines().take(20).collect::<Vec<_>>().join("\n");
        Self {
            tool: tool.into(),
            path: path.into(),
            summary: summary.into(),
            preview,
        }
    }
}

#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn approve(&self, request: &ApprovalRequest) -> bool;
}

/// 全部放行（`[approval] mode = "auto"`）
pub struct AutoApprove;

#[async_trait]
impl ApprovalHandler for AutoApprove {
    async fn approve(&self, request: &ApprovalRequest) -> bool {
        tracing::debug!(tool = %request.tool, path = %request.path, "auto-approved write");
        true
    }
}

/// 终端 y/n 确认；stdin 读取放在 spawn_blocking 里
pub struct ConsoleApproval;

#[async_trait]
impl ApprovalHandler for ConsoleApproval {
    async fn approve(&self, request: &ApprovalRequest) -> bool {
        println!("\n--- {} on {} ---", request.tool, request.path);
        println!("{}", request.summary);
        if !request.preview.is_empty() {
            println!("{}", request.preview);
        }
        print!("Approve? (y/n): ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let answer = tokio::task::spawn_blocking(|| {
            let mut input = String::new();
            io::stdin().read_line(&mut input).map(|_| input)
        })
        .await;
        match answer {
            Ok(Ok(input)) => {
                let input = input.trim().to_lowercase();
                input == "y" || input == "yes"
            }
            _ => false,
        }
    }
}

/// 固定答复并计数，测试与无人值守脚本使用
pub struct FixedApproval {
    answer: bool,
    requests: AtomicUsize,
}

impl FixedApproval {
    pub fn allow() -> Self {
        Self {
            answer: true,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn deny() -> Self {
        Self {
            answer: false,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApprovalHandler for FixedApproval {
    async fn approve(&self, _request: &ApprovalRequest) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

pub fn approval_for_mode(mode: ApprovalMode) -> std::sync::Arc<dyn ApprovalHandler> {
    match mode {
        ApprovalMode::Auto => std::sync::Arc::new(AutoApprove),
        ApprovalMode::Console => std::sync::Arc::new(ConsoleApproval),
    }
}
