//! 可观测性：tracing 订阅器初始化
//!
//! 默认级别 info，RUST_LOG 可覆盖；输出到 stderr，避免与终端交互输出混在一起。
//! 工具调用审计行带 `audit` 字段（JSON），可按 `RUST_LOG=hive::tools=info` 单独过滤。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "info";

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init();
    if let Err(e) = result {
        // 已有全局订阅器（如测试中重复初始化）时忽略
        eprintln!("tracing already initialized: {e}");
    }
}
