//! # LLM Access
//!
//! Model backends, message types, and the failover pool the decision engine uses
//! for free-text generation and tool-use turns.

pub mod backend;
pub mod pool;
pub mod types;

pub use backend::{LlmBackend, OllamaBackend};
pub use pool::{derive_label, LlmClientPool};
pub use types::{ChatMessage, CompletionRequest, Role, ToolCall, ToolDefinition, ToolReply};
