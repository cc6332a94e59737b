//! 脚本化 UserIo：按预设队列回答，记录所有输出，测试与非交互运行使用

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ui::{ReviewChoice, UserIo};

/// 输出记录的共享句柄，会话拿走 ScriptedIo 后仍可读取
#[derive(Debug, Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<String>>>);

impl Transcript {
    fn push(&self, line: String) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

#[derive(Debug, Default)]
pub struct ScriptedIo {
    inputs: VecDeque<String>,
    reviews: VecDeque<ReviewChoice>,
    feedback: VecDeque<String>,
    transcript: Transcript,
}

impl ScriptedIo {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// 审阅答复用完后一律 Proceed
    pub fn with_reviews(mut self, reviews: impl IntoIterator<Item = ReviewChoice>) -> Self {
        self.reviews = reviews.into_iter().collect();
        self
    }

    pub fn with_feedback<I, S>(mut self, feedback: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feedback = feedback.into_iter().map(Into::into).collect();
        self
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }
}

#[async_trait]
impl UserIo for ScriptedIo {
    async fn read_input(&mut self) -> Option<String> {
        let input = self.inputs.pop_front();
        if let Some(line) = &input {
            self.transcript.push(format!("input: {line}"));
        }
        input
    }

    async fn review_plan(&mut self, rendered_plan: &str) -> ReviewChoice {
        self.transcript.push(format!("review: {rendered_plan}"));
        self.reviews.pop_front().unwrap_or(ReviewChoice::Proceed)
    }

    async fn collect_feedback(&mut self) -> Option<String> {
        self.feedback.pop_front()
    }

    fn show(&mut self, text: &str) {
        self.transcript.push(format!("show: {text}"));
    }

    fn status(&mut self, text: &str) {
        self.transcript.push(format!("status: {text}"));
    }

    fn diagnostic(&mut self, text: &str) {
        self.transcript.push(format!("diagnostic: {text}"));
    }

    fn stream_chunk(&mut self, _chunk: &str) {}

    fn clear(&mut self) {
        self.transcript.push("clear".to_string());
    }
}
