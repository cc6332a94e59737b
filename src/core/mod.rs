//! 核心编排层：错误类型、会话状态、自动修复循环、错误恢复、会话状态机

pub mod error;
pub mod fix_loop;
pub mod recovery;
pub mod session;
pub mod state;

pub use error::{AgentError, FieldError};
pub use fix_loop::{describe_failure, FixDecision, FixLoop};
pub use recovery::{RecoveryAction, RecoveryEngine};
pub use session::SessionController;
pub use state::{Session, SessionState};
