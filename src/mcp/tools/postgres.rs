//! Database Tools
//!
//! PostgreSQL tools: environment check, connection, table listing, table
//! reads, read-only queries and column schemas.

use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write;
use tracing::warn;

use super::{missing_line, parse_args};
use crate::config::{vars, working_dir_report};
use crate::database::{
    ColumnInfo, DatabaseError, QueryRows, ReadOnlyQuery, TableName, DEFAULT_QUERY_LIMIT,
};
use crate::mcp::context::PostgresContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

const MAX_QUERY_LIMIT: u32 = 1000;

pub fn register_tools(registry: &mut McpRegistry<PostgresContext>) {
    registry.register_tool(debug_env_tool());
    registry.register_tool(connect_tool());
    registry.register_tool(list_tables_tool());
    registry.register_tool(query_table_tool());
    registry.register_tool(execute_query_tool());
    registry.register_tool(get_schema_tool());
}

fn db_error(action: &str, e: DatabaseError) -> ToolResult {
    warn!("{} failed: {}", action, e);
    Ok(ToolsCallResult::error(format!("{} failed: {}", action, e)))
}

// ============================================================================
// debug_postgres_env
// ============================================================================

fn debug_env_tool() -> RegisteredTool<PostgresContext> {
    ToolBuilder::new("debug_postgres_env")
        .description(
            "Show whether the PostgreSQL connection string is configured (password redacted) \
             and name any missing variables",
        )
        .build(debug_env_handler)
}

async fn debug_env_handler(ctx: PostgresContext, _params: Value) -> ToolResult {
    let url_line = match ctx.settings.redacted_url() {
        Some(url) => format!("- {}: {}", vars::MCP_POSTGRES_URL, url),
        None => format!("- {}: NOT SET", vars::MCP_POSTGRES_URL),
    };
    let lines = [
        url_line,
        ctx.env
            .describe(vars::MCP_POSTGRES_CONNECT_TIMEOUT_SECS, false),
    ];

    Ok(ToolsCallResult::text(format!(
        "**PostgreSQL environment**\n\n{}\n\n{}\n\n{}",
        lines.join("\n"),
        working_dir_report(),
        missing_line(&ctx.settings.missing_vars())
    )))
}

// ============================================================================
// connect_postgres
// ============================================================================

fn connect_tool() -> RegisteredTool<PostgresContext> {
    ToolBuilder::new("connect_postgres")
        .description("Connect (or reconnect) to PostgreSQL and report the server version")
        .build(connect_handler)
}

async fn connect_handler(ctx: PostgresContext, _params: Value) -> ToolResult {
    match ctx.database.connect().await {
        Ok(version) => Ok(ToolsCallResult::text(format!(
            "Connected to PostgreSQL\n\nHost: {}\nVersion: {}",
            ctx.settings.host_part().unwrap_or_default(),
            version
        ))),
        Err(e) => db_error("Connection", e),
    }
}

// ============================================================================
// list_postgres_tables
// ============================================================================

fn list_tables_tool() -> RegisteredTool<PostgresContext> {
    ToolBuilder::new("list_postgres_tables")
        .description("List user tables in the database, grouped by schema")
        .build(list_tables_handler)
}

async fn list_tables_handler(ctx: PostgresContext, _params: Value) -> ToolResult {
    let tables = match ctx.database.list_tables().await {
        Ok(tables) => tables,
        Err(e) => return db_error("Listing tables", e),
    };

    if tables.is_empty() {
        return Ok(ToolsCallResult::text("No tables found."));
    }

    let mut text = format!("Found {} tables:\n", tables.len());
    let mut current_schema: Option<&str> = None;
    for table in &tables {
        if current_schema != Some(table.schema.as_str()) {
            let _ = write!(text, "\n**{}**\n", table.schema);
            current_schema = Some(table.schema.as_str());
        }
        let _ = writeln!(text, "- {}", table.name);
    }

    Ok(ToolsCallResult::text(text.trim_end()))
}

// ============================================================================
// query_postgres_table
// ============================================================================

#[derive(Debug, Deserialize)]
struct QueryTableParams {
    table_name: String,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

fn default_limit() -> u32 {
    DEFAULT_QUERY_LIMIT
}

fn query_table_tool() -> RegisteredTool<PostgresContext> {
    ToolBuilder::new("query_postgres_table")
        .description("Read rows from a table (SELECT * with LIMIT and OFFSET)")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "table_name": {
                    "type": "string",
                    "description": "Table name, optionally schema-qualified (schema.table)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of rows (default 100)",
                    "minimum": 1,
                    "maximum": MAX_QUERY_LIMIT
                },
                "offset": {
                    "type": "integer",
                    "description": "Number of rows to skip (default 0)",
                    "minimum": 0
                }
            },
            "required": ["table_name"]
        }))
        .build(query_table_handler)
}

async fn query_table_handler(ctx: PostgresContext, params: Value) -> ToolResult {
    let params: QueryTableParams = parse_args(params)?;
    let limit = params.limit;
    if !(1..=MAX_QUERY_LIMIT).contains(&limit) {
        return Err(McpError::InvalidParams(format!(
            "limit must be between 1 and {}, got {}",
            MAX_QUERY_LIMIT, limit
        )));
    }
    let table = match TableName::parse(&params.table_name) {
        Ok(table) => table,
        Err(e) => return Ok(ToolsCallResult::error(e.to_string())),
    };

    match ctx.database.query_table(&table, limit, params.offset).await {
        Ok(rows) => Ok(ToolsCallResult::text(format!(
            "Table `{}` (limit {}, offset {}), {} rows:\n\n{}",
            table,
            limit,
            params.offset,
            rows.rows.len(),
            rows.to_markdown()
        ))),
        Err(e) => db_error("Query", e),
    }
}

// ============================================================================
// execute_postgres_query
// ============================================================================

#[derive(Debug, Deserialize)]
struct ExecuteQueryParams {
    query: String,
}

fn execute_query_tool() -> RegisteredTool<PostgresContext> {
    ToolBuilder::new("execute_postgres_query")
        .description(
            "Run a single read-only SELECT statement. Other statements are rejected and \
             the query runs inside a READ ONLY transaction",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "A single SELECT statement"
                }
            },
            "required": ["query"]
        }))
        .build(execute_query_handler)
}

async fn execute_query_handler(ctx: PostgresContext, params: Value) -> ToolResult {
    let params: ExecuteQueryParams = parse_args(params)?;
    let query = match ReadOnlyQuery::parse(&params.query) {
        Ok(query) => query,
        Err(e) => {
            warn!("Rejected query: {}", e);
            return Ok(ToolsCallResult::error(format!("Query rejected: {}", e)));
        }
    };

    match ctx.database.execute_query(&query).await {
        Ok(rows) => Ok(ToolsCallResult::text(format!(
            "Query returned {} rows:\n\n{}",
            rows.rows.len(),
            rows.to_markdown()
        ))),
        Err(e) => db_error("Query", e),
    }
}

// ============================================================================
// get_postgres_schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetSchemaParams {
    table_name: String,
}

fn get_schema_tool() -> RegisteredTool<PostgresContext> {
    ToolBuilder::new("get_postgres_schema")
        .description("Describe a table's columns: types, nullability, defaults and key constraints")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "table_name": {
                    "type": "string",
                    "description": "Table name, optionally schema-qualified (defaults to schema public)"
                }
            },
            "required": ["table_name"]
        }))
        .build(get_schema_handler)
}

async fn get_schema_handler(ctx: PostgresContext, params: Value) -> ToolResult {
    let params: GetSchemaParams = parse_args(params)?;
    let table = match TableName::parse(&params.table_name) {
        Ok(table) => table,
        Err(e) => return Ok(ToolsCallResult::error(e.to_string())),
    };

    match ctx.database.table_schema(&table).await {
        Ok(columns) => Ok(ToolsCallResult::text(format!(
            "Schema for `{}.{}`:\n\n{}",
            table.schema(),
            table.table(),
            schema_rows(&columns).to_markdown()
        ))),
        Err(e) => db_error("Schema lookup", e),
    }
}

pub(crate) fn schema_rows(columns: &[ColumnInfo]) -> QueryRows {
    QueryRows {
        columns: ["Column", "Type", "Nullable", "Default", "Keys"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        rows: columns
            .iter()
            .map(|c| {
                vec![
                    Some(c.name.clone()),
                    Some(c.data_type.clone()),
                    Some(if c.nullable { "YES" } else { "NO" }.to_string()),
                    Some(c.default.clone().unwrap_or_default()),
                    Some(c.key_constraints.join(", ")),
                ]
            })
            .collect(),
    }
}
