//! 控制台实现：crossterm 着色输出，stdin 读取放在 spawn_blocking 中

use std::io::{self, Write};

use async_trait::async_trait;
use crossterm::{
    cursor::MoveTo,
    execute,
    style::Stylize,
    terminal::{Clear, ClearType},
};

use crate::ui::{ReviewChoice, UserIo};

#[derive(Debug, Default)]
pub struct ConsoleIo {
    /// 当前这段流式输出的内容，非空表示需要换行补齐
    streamed: String,
}

impl ConsoleIo {
    pub fn new() -> Self {
        Self::default()
    }

    fn end_stream(&mut self) {
        if !self.streamed.is_empty() {
            println!();
            self.streamed.clear();
        }
    }

    async fn read_line(prompt: String) -> Option<String> {
        print!("{prompt}");
        io::stdout().flush().ok()?;
        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            }
        })
        .await
        .ok()
        .flatten()
    }
}

#[async_trait]
impl UserIo for ConsoleIo {
    async fn read_input(&mut self) -> Option<String> {
        self.end_stream();
        Self::read_line(format!("{} ", ">".cyan().bold())).await
    }

    async fn review_plan(&mut self, rendered_plan: &str) -> ReviewChoice {
        self.end_stream();
        println!("{}", rendered_plan);
        loop {
            let answer = Self::read_line(format!(
                "{} ",
                "[p]roceed / [m]odify / [c]ancel:".yellow()
            ))
            .await;
            match answer.as_deref().map(|a| a.trim().to_lowercase()).as_deref() {
                Some("p") | Some("proceed") | Some("y") | Some("yes") | Some("") => {
                    return ReviewChoice::Proceed
                }
                Some("m") | Some("modify") => return ReviewChoice::Modify,
                Some("c") | Some("cancel") | Some("n") | Some("no") | None => {
                    return ReviewChoice::Cancel
                }
                Some(other) => println!("Unrecognised choice '{other}'"),
            }
        }
    }

    async fn collect_feedback(&mut self) -> Option<String> {
        self.end_stream();
        Self::read_line(format!("{} ", "What should change?".yellow())).await
    }

    fn show(&mut self, text: &str) {
        // 刚流式输出过的同一段文本不再重复打印
        let already_streamed = self.streamed == text;
        self.end_stream();
        if !already_streamed {
            println!("{text}");
        }
    }

    fn status(&mut self, text: &str) {
        self.end_stream();
        println!("{}", text.dark_grey());
    }

    fn diagnostic(&mut self, text: &str) {
        self.end_stream();
        eprintln!("{}", text.red());
    }

    fn stream_chunk(&mut self, chunk: &str) {
        self.streamed.push_str(chunk);
        print!("{chunk}");
        let _ = io::stdout().flush();
    }

    fn clear(&mut self) {
        self.streamed.clear();
        if let Err(e) = execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0)) {
            tracing::debug!(error = %e, "terminal clear failed");
        }
    }
}
