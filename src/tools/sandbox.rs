//! 沙箱文件系统
//!
//! SafeFs 绑定工作根目录，所有路径经 resolve 校验必须落在根下（`..`、绝对路径、符号链接逃逸都会被拒绝），
//! 校验发生在任何 I/O 之前。列目录与查找文件时应用忽略规则（配置的 glob + 根目录 `.gitignore`）。

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::core::AgentError;

#[derive(Debug, Clone)]
pub struct SafeFs {
    root: PathBuf,
    ignore: Vec<Pattern>,
    max_file_bytes: usize,
}

impl SafeFs {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, AgentError> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self {
            root,
            ignore: Vec::new(),
            max_file_bytes: 10 * 1024 * 1024,
        })
    }

    /// 追加忽略规则；根目录存在 `.gitignore` 时一并读入（跳过注释与 `!` 取反行）
    pub fn with_ignore_patterns(mut self, patterns: &[String]) -> Self {
        let gitignore = std::fs::read_to_string(self.root.join(".gitignore")).unwrap_or_default();
        let lines = patterns
            .iter()
            .map(String::as_str)
            .chain(gitignore.lines())
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'));
        for line in lines {
            let line = line.trim_start_matches('/').trim_end_matches('/');
            match Pattern::new(line) {
                Ok(p) => self.ignore.push(p),
                Err(e) => tracing::warn!(pattern = %line, error = %e, "skipping invalid ignore pattern"),
            }
        }
        self
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: usize) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 把请求路径解析为根目录下的绝对路径
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let raw = path.trim();
        let escape = || AgentError::PathSandbox(raw.to_string());
        let requested = Path::new(raw);
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };

        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(escape());
                    }
                }
                Component::CurDir => {}
                other => normalized.push(other.as_os_str()),
            }
        }
        if !normalized.starts_with(&self.root) {
            return Err(escape());
        }

        // 已存在的最长前缀做 canonicalize，识别指向根外的符号链接
        let mut existing = normalized.clone();
        let mut tail = Vec::new();
        while std::fs::symlink_metadata(&existing).is_err() {
            match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
                (Some(name), Some(parent)) => {
                    tail.push(name);
                    existing = parent.to_path_buf();
                }
                _ => return Err(escape()),
            }
        }
        let canonical = existing.canonicalize().map_err(|_| escape())?;
        if !canonical.starts_with(&self.root) {
            return Err(escape());
        }
        Ok(tail.into_iter().rev().fold(canonical, |acc, part| acc.join(part)))
    }

    /// 根目录下的相对路径（`/` 分隔）
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn read_file(&self, path: &str) -> Result<String, AgentError> {
        let resolved = self.resolve(path)?;
        let meta = std::fs::metadata(&resolved)
            .map_err(|e| AgentError::Execution(format!("Cannot read {path}: {e}")))?;
        if !meta.is_file() {
            return Err(AgentError::Execution(format!("{path} is not a file")));
        }
        if meta.len() as usize > self.max_file_bytes {
            return Err(AgentError::Execution(format!(
                "{path} is {} bytes, over the {} byte limit",
                meta.len(),
                self.max_file_bytes
            )));
        }
        Ok(std::fs::read_to_string(&resolved)?)
    }

    /// 写文件，必要时创建父目录
    pub fn write_file(&self, path: &str, content: &str) -> Result<PathBuf, AgentError> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            return Err(AgentError::Execution(format!("{path} is a directory")));
        }
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&resolved, content)?;
        Ok(resolved)
    }

    pub fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<String>, AgentError> {
        self.walk(path, recursive, |entry| entry.file_type().is_file())
    }

    pub fn list_directories(&self, path: &str, recursive: bool) -> Result<Vec<String>, AgentError> {
        self.walk(path, recursive, |entry| entry.file_type().is_dir())
    }

    /// 按 glob（相对根目录，如 `src/**/*.rs`）查找文件
    pub fn find_files(&self, pattern: &str) -> Result<Vec<String>, AgentError> {
        let pattern = pattern.trim().trim_start_matches("./");
        if Path::new(pattern).is_absolute()
            || Path::new(pattern).components().any(|c| c == Component::ParentDir)
        {
            return Err(AgentError::PathSandbox(pattern.to_string()));
        }
        let glob = Pattern::new(pattern).map_err(|e| AgentError::Validation {
            tool: "find_files".to_string(),
            errors: vec![crate::core::FieldError::new("pattern", e.to_string())],
        })?;
        let options = MatchOptions {
            require_literal_separator: false,
            ..MatchOptions::new()
        };
        let files = self.list_files(".", true)?;
        Ok(files
            .into_iter()
            .filter(|rel| glob.matches_with(rel, options))
            .collect())
    }

    pub fn is_ignored(&self, rel: &str) -> bool {
        if rel.is_empty() {
            return false;
        }
        self.ignore.iter().any(|p| {
            p.matches(rel) || rel.split('/').any(|segment| p.matches(segment))
        })
    }

    fn walk(
        &self,
        path: &str,
        recursive: bool,
        keep: impl Fn(&walkdir::DirEntry) -> bool,
    ) -> Result<Vec<String>, AgentError> {
        let base = self.resolve(path)?;
        if !base.is_dir() {
            return Err(AgentError::Execution(format!("{path} is not a directory")));
        }
        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut out = Vec::new();
        let walker = WalkDir::new(&base)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_ignored(&self.relative(e.path())));
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if keep(&entry) {
                out.push(self.relative(entry.path()));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, SafeFs) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(dir.path().join("src/nested/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("target/debug/out"), "").unwrap();
        std::fs::write(dir.path().join("notes.log"), "").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "# build\n*.log\n").unwrap();
        let fs = SafeFs::new(dir.path())
            .unwrap()
            .with_ignore_patterns(&["target".to_string()]);
        (dir, fs)
    }

    #[test]
    fn test_rejects_escapes() {
        let (_dir, fs) = sandbox();
        assert!(matches!(fs.resolve("../outside"), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.resolve("src/../../x"), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.resolve("/etc/passwd"), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.read_file("../secret"), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.write_file("../x", "y"), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.list_files("..", false), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.find_files("../*"), Err(AgentError::PathSandbox(_))));
    }

    #[test]
    fn test_resolves_inside_paths() {
        let (_dir, fs) = sandbox();
        assert_eq!(fs.resolve("src/../src/main.rs").unwrap(), fs.root().join("src/main.rs"));
        assert_eq!(fs.resolve("new/file.txt").unwrap(), fs.root().join("new/file.txt"));
        let absolute = fs.root().join("src/main.rs");
        assert!(fs.resolve(absolute.to_str().unwrap()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let (dir, fs) = sandbox();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        assert!(matches!(fs.read_file("link/secret"), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.write_file("link/new", "x"), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.list_files("link", true), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.list_directories("link", false), Err(AgentError::PathSandbox(_))));
        assert!(!outside.path().join("new").exists());

        // 遍历不跟随符号链接
        let all = fs.list_files(".", true).unwrap();
        assert!(!all.iter().any(|f| f.starts_with("link")));
        assert!(fs.find_files("link/*").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_absolute_paths_outside_root() {
        let (_dir, fs) = sandbox();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret"), "s").unwrap();
        let abs = outside.path().to_string_lossy().to_string();
        let file = outside.path().join("secret").to_string_lossy().to_string();
        assert!(matches!(fs.read_file(&file), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.write_file(&file, "x"), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.list_files(&abs, true), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.list_directories(&abs, true), Err(AgentError::PathSandbox(_))));
        assert!(matches!(fs.find_files(&format!("{abs}/*")), Err(AgentError::PathSandbox(_))));
        assert_eq!(std::fs::read_to_string(outside.path().join("secret")).unwrap(), "s");
    }

    #[test]
    fn test_listing_honours_ignores() {
        let (_dir, fs) = sandbox();
        assert_eq!(
            fs.list_files(".", true).unwrap(),
            vec![".gitignore", "src/main.rs", "src/nested/lib.rs"]
        );
        assert_eq!(fs.list_files("src", false).unwrap(), vec!["src/main.rs"]);
        assert_eq!(fs.list_directories(".", true).unwrap(), vec!["src", "src/nested"]);
        assert_eq!(
            fs.find_files("src/**/*.rs").unwrap(),
            vec!["src/main.rs", "src/nested/lib.rs"]
        );
    }

    #[test]
    fn test_write_creates_parents_and_limits_reads() {
        let (_dir, fs) = sandbox();
        fs.write_file("docs/readme.md", "hello").unwrap();
        assert_eq!(fs.read_file("docs/readme.md").unwrap(), "hello");
        let small = fs.clone().with_max_file_bytes(2);
        assert!(matches!(small.read_file("docs/readme.md"), Err(AgentError::Execution(_))));
    }
}
