//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Ollama / Mock）、provider 工厂、分层句柄、结构化输出

pub mod factory;
pub mod handle;
pub mod mock;
pub mod openai;
pub mod providers;
pub mod structured;
pub mod traits;

pub use factory::{ProviderFactory, ProviderSelection};
pub use handle::LlmHandle;
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, OpenAiSettings};
pub use structured::{extract_json, generate_structured};
pub use traits::{generate, generate_stream, LlmClient, LlmError, TokenStream};
