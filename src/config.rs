//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__FIX__MAX_ATTEMPTS=5`）。
//! 配置值在入口处构建一次，显式向下传递，不存在全局单例。

use std::path::PathBuf;

use serde::Deserialize;

use crate::planning::LlmTier;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub planning: PlanningSection,
    pub strategy: StrategySection,
    pub fix: FixSection,
    pub validation: ValidationSection,
    pub tools: ToolsSection,
    pub approval: ApprovalSection,
}

impl AppConfig {
    /// 沙箱根目录：配置 > 当前目录
    pub fn workspace_root(&self) -> PathBuf {
        self.app
            .workspace_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// [app] 段：工作目录、历史上限、提示模板目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 沙箱根目录，未设置时用当前目录
    pub workspace_root: Option<PathBuf>,
    /// 聊天历史保留条数
    pub max_history: usize,
    /// `/save` 与任务历史的落盘目录（相对沙箱根）
    pub history_dir: PathBuf,
    pub prompts_dir: PathBuf,
    /// 启动后第一次等待输入时直接消费的请求
    pub initial_prompt: Option<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            workspace_root: None,
            max_history: 100,
            history_dir: PathBuf::from(".hive/history"),
            prompts_dir: PathBuf::from("config/prompts"),
            initial_prompt: None,
        }
    }
}

/// [llm] 段：provider 列表（按声明顺序回退）、首选项、分层映射与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 显式指定的 provider（最高优先）
    pub provider: Option<String>,
    pub preferred_provider: Option<String>,
    pub providers: Vec<ProviderConfig>,
    pub tiers: TierSection,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: None,
            preferred_provider: None,
            providers: vec![
                ProviderConfig::named("deepseek"),
                ProviderConfig::named("openai"),
                ProviderConfig::named("ollama"),
            ],
            tiers: TierSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

impl LlmSection {
    pub fn provider_config(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// [[llm.providers]]：name 为工厂键（openai / deepseek / ollama / mock），kind 可覆盖
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 读取 API Key 的环境变量名，未设置时用 provider 默认值
    pub api_key_env: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            model: None,
            base_url: None,
            api_key_env: None,
            enabled: true,
        }
    }

    /// 工厂键：kind 优先，否则用 name
    pub fn kind(&self) -> String {
        self.kind.clone().unwrap_or_else(|| self.name.clone()).to_lowercase()
    }
}

fn default_true() -> bool {
    true
}

/// [llm.tiers]：LOCAL / REMOTE 分别使用哪个 provider
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TierSection {
    pub local: Option<String>,
    pub remote: Option<String>,
}

impl Default for TierSection {
    fn default() -> Self {
        Self {
            local: Some("ollama".to_string()),
            remote: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
    /// 可用性探测超时（秒）
    pub probe: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: 120,
            probe: 5,
        }
    }
}

/// [planning] 段：复杂度评估阈值与权重、分解参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlanningSection {
    pub enabled: bool,
    pub medium_threshold: f64,
    pub high_threshold: f64,
    pub weights: FactorWeights,
    /// priorSuccessRate=1 时最多压低的比例
    pub risk_discount: f64,
    /// 强制复杂度等级（LOW / MEDIUM / HIGH），未识别的值按 MEDIUM
    pub forced_level: Option<String>,
    /// HIGH 分解时的实现子任务方向
    pub implementation_areas: Vec<String>,
}

impl Default for PlanningSection {
    fn default() -> Self {
        Self {
            enabled: true,
            medium_threshold: 40.0,
            high_threshold: 70.0,
            weights: FactorWeights::default(),
            risk_discount: 0.25,
            forced_level: None,
            implementation_areas: vec![
                "data model and storage".to_string(),
                "core logic".to_string(),
                "public interface and error handling".to_string(),
            ],
        }
    }
}

/// 各因子权重，总和必须为 1
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub task_type: f64,
    pub scope_size: f64,
    pub dependencies: f64,
    pub technology: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            task_type: 0.3,
            scope_size: 0.3,
            dependencies: 0.2,
            technology: 0.2,
        }
    }
}

impl FactorWeights {
    pub fn sum(&self) -> f64 {
        self.task_type + self.scope_size + self.dependencies + self.technology
    }
}

/// [strategy] 段：LLM 分层选择阈值与标签覆盖（按列表顺序匹配）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategySection {
    pub remote_threshold: f64,
    pub hybrid_threshold: f64,
    pub tag_overrides: Vec<TagOverride>,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            remote_threshold: 70.0,
            hybrid_threshold: 40.0,
            tag_overrides: vec![
                TagOverride::new("security", LlmTier::Remote),
                TagOverride::new("architecture", LlmTier::Remote),
                TagOverride::new("docs", LlmTier::Local),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagOverride {
    pub tag: String,
    pub tier: LlmTier,
}

impl TagOverride {
    pub fn new(tag: impl Into<String>, tier: LlmTier) -> Self {
        Self {
            tag: tag.into(),
            tier,
        }
    }
}

/// [fix] 段：自动修复上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FixSection {
    pub max_attempts: u32,
}

impl Default for FixSection {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// [validation] 段：是否校验、校验命令（如 `cargo check`）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    pub enabled: bool,
    pub command: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
            timeout_secs: 300,
        }
    }
}

/// [tools] 段：工具循环步数上限、单次超时、忽略规则、进程白名单
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单个子任务内 LLM 工具调用的最大步数
    pub max_steps: usize,
    pub tool_timeout_secs: u64,
    pub ignore_patterns: Vec<String>,
    pub max_file_bytes: usize,
    pub process: ProcessSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            max_steps: 15,
            tool_timeout_secs: 60,
            ignore_patterns: vec![
                ".git".to_string(),
                ".hive".to_string(),
                "target".to_string(),
                "node_modules".to_string(),
            ],
            max_file_bytes: 10 * 1024 * 1024,
            process: ProcessSection::default(),
        }
    }
}

/// [tools.process] 段：允许执行的命令名（仅首词）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessSection {
    pub allowed_commands: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ProcessSection {
    fn default() -> Self {
        Self {
            allowed_commands: ["ls", "grep", "wc", "cargo", "rustc", "git", "npm"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// 每次写入前在终端询问
    #[default]
    Console,
    /// 自动批准（非交互场景）
    Auto,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    pub mode: ApprovalMode,
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
