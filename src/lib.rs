//! Conversational access to an OpenMetadata catalog and a PostgreSQL
//! database through an LLM and two MCP tool servers.
//!
//! The library backs three binaries: `chat-app`, `catalog-mcp` and
//! `postgres-mcp`.

pub mod catalog;
pub mod chat;
pub mod config;
pub mod database;
pub mod logging;
pub mod mcp;
