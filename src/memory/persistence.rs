//! 历史持久化
//!
//! `/save <name>` 把聊天历史写成 `<dir>/<name>.json`；完成的计划追加到 `<dir>/tasks.json`（有序列表）。

use std::path::{Path, PathBuf};

use crate::memory::ChatEntry;
use crate::planning::TaskPlan;

const TASK_HISTORY_FILE: &str = "tasks.json";

#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 名称只允许字母数字、`-`、`_`，防止写出目录
    pub fn save_chat(&self, name: &str, entries: &[ChatEntry]) -> anyhow::Result<PathBuf> {
        let name = name.trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!("invalid history name '{}': use letters, digits, '-' or '_'", name);
        }
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{name}.json"));
        std::fs::write(&path, serde_json::to_string_pretty(entries)?)?;
        Ok(path)
    }

    pub fn load_chat(&self, name: &str) -> anyhow::Result<Vec<ChatEntry>> {
        let path = self.dir.join(format!("{name}.json"));
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// 读取已完成计划列表；文件不存在时返回空 Vec
    pub fn load_tasks(&self) -> anyhow::Result<Vec<TaskPlan>> {
        let path = self.dir.join(TASK_HISTORY_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn append_task(&self, plan: &TaskPlan) -> anyhow::Result<()> {
        let mut tasks = self.load_tasks()?;
        tasks.push(plan.clone());
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(
            self.dir.join(TASK_HISTORY_FILE),
            serde_json::to_string_pretty(&tasks)?,
        )?;
        Ok(())
    }
}
