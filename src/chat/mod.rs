//! Chat application: LLM conversation, MCP connections and the terminal UI.

pub mod llm;
pub mod repl;
pub mod session;
pub mod style;
pub mod watch;

pub use repl::ChatApp;
pub use session::{ChatError, ChatReply, ChatSession, McpConnection, ToolInvocation};
pub use watch::ConfigSource;
