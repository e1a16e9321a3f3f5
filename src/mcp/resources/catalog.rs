//! Catalog Resources

use serde_json::json;

use crate::catalog::resolve_table;
use crate::config::CatalogAuth;
use crate::mcp::context::CatalogContext;
use crate::mcp::protocol::{McpError, ResourceContent};
use crate::mcp::registry::{last_uri_segment, McpRegistry, ResourceBuilder, ResourceResult};

const JSON_MIME: &str = "application/json";

pub fn register_resources(registry: &mut McpRegistry<CatalogContext>) {
    registry.register_resource(
        ResourceBuilder::new("openmetadata://catalog", "OpenMetadata adapter")
            .description("Catalog host, authentication mode and lookup prefixes")
            .mime_type(JSON_MIME)
            .build(overview_handler),
    );
    registry.register_resource(
        ResourceBuilder::new("openmetadata://tables/{table}", "Catalog table")
            .description("Raw OpenMetadata entity for a table name, FQN or id")
            .mime_type(JSON_MIME)
            .build(table_handler),
    );
}

async fn overview_handler(ctx: CatalogContext, uri: String) -> ResourceResult {
    let auth = match &ctx.settings.auth {
        CatalogAuth::Jwt(_) => "jwt",
        CatalogAuth::Login { .. } => "login",
        CatalogAuth::None => "none",
    };
    let body = json!({
        "host": ctx.settings.host,
        "auth": auth,
        "fqn_prefixes": ctx.settings.fqn_prefixes,
        "missing": ctx.settings.missing_vars(),
    });
    Ok(vec![ResourceContent {
        uri,
        mime_type: Some(JSON_MIME.to_string()),
        text: serde_json::to_string_pretty(&body)?,
    }])
}

async fn table_handler(ctx: CatalogContext, uri: String) -> ResourceResult {
    let identifier =
        last_uri_segment(&uri).ok_or_else(|| McpError::ResourceNotFound(uri.clone()))?;

    let found = resolve_table(ctx.catalog.as_ref(), &identifier, &ctx.settings.fqn_prefixes)
        .await
        .map_err(|e| {
            if e.last_error.is_not_found() {
                McpError::ResourceNotFound(format!("{} ({})", uri, e.last_error.service_message()))
            } else {
                McpError::InternalError(e.last_error.to_string())
            }
        })?;

    Ok(vec![ResourceContent {
        uri,
        mime_type: Some(JSON_MIME.to_string()),
        text: serde_json::to_string_pretty(&found.table)?,
    }])
}
