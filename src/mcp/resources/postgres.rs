//! Database Resources

use serde_json::json;

use crate::database::{DatabaseError, TableName};
use crate::mcp::context::PostgresContext;
use crate::mcp::protocol::{McpError, ResourceContent};
use crate::mcp::registry::{last_uri_segment, McpRegistry, ResourceBuilder, ResourceResult};

const JSON_MIME: &str = "application/json";

pub fn register_resources(registry: &mut McpRegistry<PostgresContext>) {
    registry.register_resource(
        ResourceBuilder::new("postgresql://mcp", "PostgreSQL adapter")
            .description("Connection target (password redacted) and query policy")
            .mime_type(JSON_MIME)
            .build(overview_handler),
    );
    registry.register_resource(
        ResourceBuilder::new("postgresql://schema/{table}", "Table schema")
            .description("Column information for a table, as JSON")
            .mime_type(JSON_MIME)
            .build(schema_handler),
    );
}

async fn overview_handler(ctx: PostgresContext, uri: String) -> ResourceResult {
    let body = json!({
        "url": ctx.settings.redacted_url(),
        "missing": ctx.settings.missing_vars(),
        "read_only": true,
        "connect_timeout_secs": ctx.settings.connect_timeout.as_secs(),
    });
    Ok(vec![ResourceContent {
        uri,
        mime_type: Some(JSON_MIME.to_string()),
        text: serde_json::to_string_pretty(&body)?,
    }])
}

async fn schema_handler(ctx: PostgresContext, uri: String) -> ResourceResult {
    let raw = last_uri_segment(&uri).ok_or_else(|| McpError::ResourceNotFound(uri.clone()))?;
    let table = TableName::parse(&raw).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let columns = ctx
        .database
        .table_schema(&table)
        .await
        .map_err(|e| match e {
            DatabaseError::TableNotFound(_) => McpError::ResourceNotFound(uri.clone()),
            other => McpError::InternalError(other.to_string()),
        })?;

    Ok(vec![ResourceContent {
        uri,
        mime_type: Some(JSON_MIME.to_string()),
        text: serde_json::to_string_pretty(&columns)?,
    }])
}
