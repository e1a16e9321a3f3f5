//! MCP Tools
//!
//! Tool implementations for the catalog and database adapters.

pub mod catalog;
pub mod postgres;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::protocol::McpError;

/// Deserialize tool arguments, mapping failures to `InvalidParams`.
pub(crate) fn parse_args<T: DeserializeOwned>(params: Value) -> Result<T, McpError> {
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

/// `Missing: A, B` or `Missing: none`
pub(crate) fn missing_line(missing: &[&str]) -> String {
    if missing.is_empty() {
        "Missing: none".to_string()
    } else {
        format!("Missing: {}", missing.join(", "))
    }
}
