//! 提示词模板
//!
//! 从 prompts_dir 加载 `*.md` / `*.txt`，文件名（去扩展名）即模板名；`/prompts` 列出，`@name` 展开为模板正文。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    dir: PathBuf,
    templates: BTreeMap<String, String>,
}

impl PromptStore {
    /// 目录不存在时得到空模板集
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let mut templates = BTreeMap::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "no prompt templates loaded");
                return Self { dir, templates };
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_template = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("md") | Some("txt")
            );
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if !is_template || !path.is_file() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(body) => {
                    templates.insert(name, body);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to read prompt template"),
            }
        }
        tracing::info!(count = templates.len(), dir = %dir.display(), "prompt templates loaded");
        Self { dir, templates }
    }

    pub fn from_templates<I, K, V>(templates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            dir: PathBuf::new(),
            templates: templates.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_templates_by_stem() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("review.md"), "Review carefully").unwrap();
        std::fs::write(dir.path().join("style.txt"), "Use rustfmt").unwrap();
        std::fs::write(dir.path().join("ignored.json"), "{}").unwrap();
        let store = PromptStore::load(dir.path());
        assert_eq!(store.names(), vec!["review", "style"]);
        assert_eq!(store.get("review"), Some("Review carefully"));
        assert_eq!(store.get("ignored"), None);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let store = PromptStore::load("/definitely/not/here");
        assert!(store.names().is_empty());
    }
}
