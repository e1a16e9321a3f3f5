//! Catalog Tools
//!
//! OpenMetadata tools: environment check, connection test, table listing and
//! table details.

use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write;
use tracing::warn;

use super::{missing_line, parse_args};
use crate::catalog::models::Table;
use crate::catalog::resolve_table;
use crate::catalog::text::{clean_description, short_id, truncate};
use crate::config::{vars, working_dir_report};
use crate::mcp::context::CatalogContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

const LIST_DESCRIPTION_CHARS: usize = 100;
const MAX_COLUMNS_SHOWN: usize = 10;
const MAX_LIST_LIMIT: u32 = 1000;

pub fn register_tools(registry: &mut McpRegistry<CatalogContext>) {
    registry.register_tool(debug_env_tool());
    registry.register_tool(test_connection_tool());
    registry.register_tool(list_tables_tool());
    registry.register_tool(get_table_tool());
}

// ============================================================================
// debug_env
// ============================================================================

fn debug_env_tool() -> RegisteredTool<CatalogContext> {
    ToolBuilder::new("debug_env")
        .description(
            "Show which OpenMetadata settings are configured (secrets are only reported as SET) \
             and name any missing variables",
        )
        .build(debug_env_handler)
}

async fn debug_env_handler(ctx: CatalogContext, _params: Value) -> ToolResult {
    let env = &ctx.env;
    let lines = [
        env.describe(vars::OPENMETADATA_HOST, false),
        env.describe(vars::OPENMETADATA_JWT_TOKEN, true),
        env.describe(vars::OPENMETADATA_USERNAME, false),
        env.describe(vars::OPENMETADATA_PASSWORD, true),
        env.describe(vars::OPENMETADATA_FQN_PREFIXES, false),
    ];

    Ok(ToolsCallResult::text(format!(
        "**OpenMetadata environment**\n\n{}\n\n{}\n\n{}",
        lines.join("\n"),
        working_dir_report(),
        missing_line(&ctx.settings.missing_vars())
    )))
}

// ============================================================================
// test_om_connection
// ============================================================================

fn test_connection_tool() -> RegisteredTool<CatalogContext> {
    ToolBuilder::new("test_om_connection")
        .description("Check that the OpenMetadata server is reachable and report its version")
        .build(test_connection_handler)
}

async fn test_connection_handler(ctx: CatalogContext, _params: Value) -> ToolResult {
    let host = ctx.catalog.host().unwrap_or("NOT SET").to_string();

    match ctx.catalog.server_version().await {
        Ok(version) => {
            let mut text = format!(
                "OpenMetadata connection successful\n\nHost: {}\nServer version: {}",
                host, version.version
            );
            if let Some(revision) = version.revision {
                let _ = write!(text, " ({})", revision);
            }
            Ok(ToolsCallResult::text(text))
        }
        Err(e) => {
            warn!("OpenMetadata connection test failed: {}", e);
            Ok(ToolsCallResult::error(format!(
                "OpenMetadata connection failed: {}\n\nHost: {}",
                e, host
            )))
        }
    }
}

// ============================================================================
// list_om_tables
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListTablesParams {
    #[serde(default = "default_list_limit")]
    limit: u32,
}

fn default_list_limit() -> u32 {
    10
}

fn list_tables_tool() -> RegisteredTool<CatalogContext> {
    ToolBuilder::new("list_om_tables")
        .description("List tables registered in the OpenMetadata catalog")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of tables to return (default 10)",
                    "minimum": 1,
                    "maximum": MAX_LIST_LIMIT
                }
            }
        }))
        .build(list_tables_handler)
}

async fn list_tables_handler(ctx: CatalogContext, params: Value) -> ToolResult {
    let params: ListTablesParams = parse_args(params)?;
    let limit = params.limit;
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(McpError::InvalidParams(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIST_LIMIT, limit
        )));
    }

    let list = match ctx.catalog.list_tables(limit).await {
        Ok(list) => list,
        Err(e) => {
            return Ok(ToolsCallResult::error(format!(
                "Failed to list tables: {}",
                e
            )))
        }
    };

    if list.data.is_empty() {
        return Ok(ToolsCallResult::text("No tables found in the catalog."));
    }

    let mut text = match list.paging.and_then(|p| p.total) {
        Some(total) => format!("Found {} tables ({} in the catalog):\n", list.data.len(), total),
        None => format!("Found {} tables:\n", list.data.len()),
    };
    for (idx, table) in list.data.iter().enumerate() {
        let description = truncate(
            &clean_description(table.description.as_deref()),
            LIST_DESCRIPTION_CHARS,
        );
        let _ = write!(
            text,
            "\n{}. **{}**\n   - FQN: {}\n   - Description: {}\n   - ID: {}\n",
            idx + 1,
            table.name,
            table.fqn(),
            description,
            short_id(&table.id)
        );
    }

    Ok(ToolsCallResult::text(text))
}

// ============================================================================
// get_om_table
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetTableParams {
    table_name: String,
}

fn get_table_tool() -> RegisteredTool<CatalogContext> {
    ToolBuilder::new("get_om_table")
        .description(
            "Get details of one catalog table: description and columns. Accepts a fully \
             qualified name, a bare table name or a table id",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "table_name": {
                    "type": "string",
                    "description": "Table name, fully qualified name (service.database.schema.table) or id"
                }
            },
            "required": ["table_name"]
        }))
        .build(get_table_handler)
}

async fn get_table_handler(ctx: CatalogContext, params: Value) -> ToolResult {
    let params: GetTableParams = parse_args(params)?;
    let identifier = params.table_name.trim();
    if identifier.is_empty() {
        return Err(McpError::InvalidParams("table_name must not be empty".to_string()));
    }

    match resolve_table(ctx.catalog.as_ref(), identifier, &ctx.settings.fqn_prefixes).await {
        Ok(found) => {
            let mut text = render_table(&found.table);
            if found.attempts.len() > 1 {
                let _ = write!(text, "\n\nResolved after {} lookups:", found.attempts.len());
                for attempt in &found.attempts {
                    let _ = write!(text, "\n- {}", attempt);
                }
            }
            Ok(ToolsCallResult::text(text))
        }
        Err(e) => {
            let mut text = e.last_error.service_message();
            text.push_str("\n\nLookup attempts:");
            for attempt in &e.attempts {
                let _ = write!(text, "\n- {}", attempt);
            }
            Ok(ToolsCallResult::error(text))
        }
    }
}

fn render_table(table: &Table) -> String {
    let mut text = format!(
        "**{}**\n\n- FQN: {}\n- ID: {}\n",
        table.name,
        table.fqn(),
        table.id
    );
    if let Some(table_type) = &table.table_type {
        let _ = writeln!(text, "- Type: {}", table_type);
    }
    let _ = writeln!(
        text,
        "- Description: {}",
        clean_description(table.description.as_deref())
    );

    let total = table.columns.len();
    if total == 0 {
        text.push_str("\nNo column information available.");
    } else {
        let shown = total.min(MAX_COLUMNS_SHOWN);
        let _ = write!(text, "\n**Columns** ({} total", total);
        if shown < total {
            let _ = write!(text, ", showing first {}", shown);
        }
        text.push_str("):\n");
        for column in table.columns.iter().take(shown) {
            let _ = write!(text, "- {} ({})", column.name, column.display_type());
            if column.description.is_some() {
                let _ = write!(text, ": {}", clean_description(column.description.as_deref()));
            }
            text.push('\n');
        }
        if shown < total {
            let _ = writeln!(text, "- ... and {} more columns", total - shown);
        }
    }

    if let Some(constraints) = table.table_constraints.as_ref().filter(|c| !c.is_empty()) {
        text.push_str("\n**Constraints**:\n");
        for constraint in constraints {
            let _ = writeln!(
                text,
                "- {} ({})",
                constraint.constraint_type,
                constraint.columns.join(", ")
            );
        }
    }

    text.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::client::{CatalogApi, CatalogError};
    use crate::catalog::models::{Column, Paging, ServerVersion, TableList};
    use crate::config::{CatalogSettings, EnvSnapshot};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct StaticCatalog {
        tables: Vec<Table>,
        reachable: bool,
    }

    #[async_trait]
    impl CatalogApi for StaticCatalog {
        fn host(&self) -> Option<&str> {
            Some("http://om.test")
        }

        async fn server_version(&self) -> Result<ServerVersion, CatalogError> {
            if self.reachable {
                Ok(ServerVersion {
                    version: "1.4.2".to_string(),
                    revision: None,
                })
            } else {
                Err(CatalogError::Api {
                    status: 503,
                    message: "service unavailable".to_string(),
                })
            }
        }

        async fn list_tables(&self, limit: u32) -> Result<TableList, CatalogError> {
            Ok(TableList {
                data: self.tables.iter().take(limit as usize).cloned().collect(),
                paging: Some(Paging {
                    total: Some(self.tables.len() as u64),
                }),
            })
        }

        async fn get_table_by_name(&self, fqn: &str) -> Result<Table, CatalogError> {
            self.tables
                .iter()
                .find(|t| t.fqn() == fqn)
                .cloned()
                .ok_or_else(|| CatalogError::Api {
                    status: 404,
                    message: format!("table instance for {} not found", fqn),
                })
        }

        async fn get_table_by_id(&self, id: &str) -> Result<Table, CatalogError> {
            self.tables
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .ok_or_else(|| CatalogError::Api {
                    status: 404,
                    message: format!("table instance for {} not found", id),
                })
        }
    }

    fn orders_table(columns: usize) -> Table {
        Table {
            id: "0a1b2c3d-0000-0000-0000-000000000000".to_string(),
            name: "orders".to_string(),
            fully_qualified_name: Some("shop.db.public.orders".to_string()),
            description: Some(format!("<p>{}</p>", "Orders ".repeat(30))),
            table_type: Some("Regular".to_string()),
            columns: (0..columns)
                .map(|i| Column {
                    name: format!("col_{}", i),
                    data_type: Some("INT".to_string()),
                    data_type_display: None,
                    description: None,
                    constraint: None,
                })
                .collect(),
            table_constraints: None,
        }
    }

    fn context(env: EnvSnapshot, catalog: StaticCatalog, prefixes: &[&str]) -> CatalogContext {
        let mut settings = CatalogSettings::from_env(&env).unwrap();
        settings.fqn_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        CatalogContext {
            env: Arc::new(env),
            settings: Arc::new(settings),
            catalog: Arc::new(catalog),
        }
    }

    fn text(result: &ToolsCallResult) -> &str {
        result.first_text().unwrap()
    }

    #[tokio::test]
    async fn test_debug_env_names_missing_vars() {
        let env = EnvSnapshot::from_pairs([(vars::OPENMETADATA_JWT_TOKEN, "secret-token")]);
        let ctx = context(env, StaticCatalog { tables: vec![], reachable: true }, &[]);
        let result = debug_env_handler(ctx, json!({})).await.unwrap();
        let out = text(&result);
        assert!(out.contains("- OPENMETADATA_HOST: NOT SET"));
        assert!(out.contains("- OPENMETADATA_JWT_TOKEN: SET"));
        assert!(!out.contains("secret-token"));
        assert!(out.contains("Missing: OPENMETADATA_HOST"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_a_tool_error() {
        let ctx = context(
            EnvSnapshot::default(),
            StaticCatalog { tables: vec![], reachable: false },
            &[],
        );
        let result = test_connection_handler(ctx, json!({})).await.unwrap();
        assert!(result.is_error());
        assert!(text(&result).contains("service unavailable"));

        let ctx = context(
            EnvSnapshot::default(),
            StaticCatalog { tables: vec![], reachable: true },
            &[],
        );
        let result = test_connection_handler(ctx, json!({})).await.unwrap();
        assert!(text(&result).contains("Server version: 1.4.2"));
    }

    #[tokio::test]
    async fn test_list_tables_truncates_descriptions() {
        let ctx = context(
            EnvSnapshot::default(),
            StaticCatalog { tables: vec![orders_table(1)], reachable: true },
            &[],
        );
        let result = list_tables_handler(ctx, json!({})).await.unwrap();
        let out = text(&result);
        assert!(out.starts_with("Found 1 tables (1 in the catalog):"));
        assert!(out.contains("1. **orders**"));
        assert!(out.contains("- FQN: shop.db.public.orders"));
        assert!(out.contains("- ID: 0a1b2c3d..."));
        assert!(!out.contains("<p>"));
        let description_line = out.lines().find(|l| l.contains("Description:")).unwrap();
        assert!(description_line.ends_with("..."));
    }

    #[tokio::test]
    async fn test_list_tables_rejects_bad_params() {
        let ctx = context(
            EnvSnapshot::default(),
            StaticCatalog { tables: vec![], reachable: true },
            &[],
        );
        let err = list_tables_handler(ctx.clone(), json!({"limit": "ten"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);

        for limit in [0, 1001] {
            let err = list_tables_handler(ctx.clone(), json!({ "limit": limit }))
                .await
                .unwrap_err();
            assert_eq!(err.code(), -32602);
            assert!(err.to_string().contains("between 1 and 1000"));
        }
    }

    #[tokio::test]
    async fn test_get_table_via_prefix_limits_columns() {
        let ctx = context(
            EnvSnapshot::default(),
            StaticCatalog { tables: vec![orders_table(12)], reachable: true },
            &["shop.db.public"],
        );
        let result = get_table_handler(ctx, json!({"table_name": "orders"}))
            .await
            .unwrap();
        let out = text(&result);
        assert!(!result.is_error());
        assert!(out.starts_with("**orders**"));
        assert!(out.contains("**Columns** (12 total, showing first 10)"));
        assert!(out.contains("- col_9 (INT)"));
        assert!(!out.contains("- col_10 (INT)"));
        assert!(out.contains("... and 2 more columns"));
        assert!(out.contains("Resolved after 2 lookups"));
    }

    #[tokio::test]
    async fn test_get_unknown_table_passes_catalog_error_through() {
        let ctx = context(
            EnvSnapshot::default(),
            StaticCatalog { tables: vec![], reachable: true },
            &[],
        );
        let result = get_table_handler(ctx, json!({"table_name": "ghost"}))
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(text(&result).starts_with("table instance for ghost not found"));
        assert!(text(&result).contains("Lookup attempts:"));
    }

    #[tokio::test]
    async fn test_get_table_requires_name() {
        let ctx = context(
            EnvSnapshot::default(),
            StaticCatalog { tables: vec![], reachable: true },
            &[],
        );
        assert!(get_table_handler(ctx.clone(), json!({})).await.is_err());
        assert!(get_table_handler(ctx, json!({"table_name": "  "})).await.is_err());
    }
}
