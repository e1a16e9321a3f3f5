//! MCP (Model Context Protocol)
//!
//! Both ends of the tool protocol used between the chat application and its
//! adapters.
//!
//! ## Architecture
//!
//! - Transport: newline-delimited JSON-RPC 2.0 over a child process's stdio
//! - Server side: [`server::McpServer`] dispatching against a [`McpRegistry`]
//! - Client side: [`client::McpClient`] spawning and supervising an adapter

pub mod client;
pub mod context;
pub mod protocol;
pub mod registry;
pub mod resources;
pub mod server;
pub mod tools;

pub use client::{McpClient, McpClientError, McpServerSpec};
pub use protocol::{McpError, McpRequest, McpResponse};
pub use registry::McpRegistry;
pub use server::McpServer;
