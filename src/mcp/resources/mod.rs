//! MCP Resources
//!
//! Read-only views of adapter configuration and metadata.

pub mod catalog;
pub mod postgres;
