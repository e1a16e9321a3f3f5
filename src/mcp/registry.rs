//! MCP Tool and Resource Registry
//!
//! Manages registration and lookup of tools and resources. The registry is
//! generic over the context handed to every handler, so each adapter binary
//! brings its own context type.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::protocol::{
    McpError, ResourceContent, ResourceDefinition, ToolDefinition, ToolsCallResult,
};

// ============================================================================
// Tool Types
// ============================================================================

/// Result type for tool execution
pub type ToolResult = Result<ToolsCallResult, McpError>;

/// Boxed future for async tool execution
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Tool handler function type
pub type ToolHandler<C> = Arc<dyn Fn(C, Value) -> ToolFuture + Send + Sync>;

/// A registered tool with metadata and handler
pub struct RegisteredTool<C> {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: ToolHandler<C>,
}

impl<C> RegisteredTool<C> {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

// ============================================================================
// Resource Types
// ============================================================================

/// Result type for resource read
pub type ResourceResult = Result<Vec<ResourceContent>, McpError>;

/// Boxed future for async resource read
pub type ResourceFuture = Pin<Box<dyn Future<Output = ResourceResult> + Send>>;

/// Resource handler function type. Receives the full requested URI.
pub type ResourceHandler<C> = Arc<dyn Fn(C, String) -> ResourceFuture + Send + Sync>;

/// A registered resource with metadata and handler
pub struct RegisteredResource<C> {
    pub uri_pattern: String,
    pub name: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub handler: ResourceHandler<C>,
}

// ============================================================================
// Registry
// ============================================================================

/// Registry for MCP tools and resources. Tools are listed in registration
/// order.
pub struct McpRegistry<C> {
    tools: Vec<RegisteredTool<C>>,
    resources: Vec<RegisteredResource<C>>,
}

impl<C> McpRegistry<C> {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Register a tool, replacing any earlier tool with the same name
    pub fn register_tool(&mut self, tool: RegisteredTool<C>) {
        self.tools.retain(|t| t.name != tool.name);
        self.tools.push(tool);
    }

    pub fn register_resource(&mut self, resource: RegisteredResource<C>) {
        self.resources.push(resource);
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(RegisteredTool::definition).collect()
    }

    pub fn get_tool(&self, name: &str) -> Option<&RegisteredTool<C>> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn resource_definitions(&self) -> Vec<ResourceDefinition> {
        self.resources
            .iter()
            .map(|resource| ResourceDefinition {
                uri: resource.uri_pattern.clone(),
                name: resource.name.clone(),
                description: resource.description.clone(),
                mime_type: resource.mime_type.clone(),
            })
            .collect()
    }

    /// Find a resource handler for a URI
    pub fn find_resource(&self, uri: &str) -> Option<&RegisteredResource<C>> {
        self.resources
            .iter()
            .find(|resource| matches_uri_pattern(&resource.uri_pattern, uri))
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

impl<C> Default for McpRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if a URI matches a pattern with {param} placeholders
fn matches_uri_pattern(pattern: &str, uri: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let uri_parts: Vec<&str> = uri.split('/').collect();

    if pattern_parts.len() != uri_parts.len() {
        return false;
    }

    pattern_parts
        .iter()
        .zip(uri_parts.iter())
        .all(|(pattern_part, uri_part)| {
            let is_param = pattern_part.starts_with('{') && pattern_part.ends_with('}');
            (is_param && !uri_part.is_empty()) || pattern_part == uri_part
        })
}

/// Extract the value of the last path segment of a URI, percent-decoded.
/// `openmetadata://tables/db.public.orders` yields `db.public.orders`.
pub fn last_uri_segment(uri: &str) -> Option<String> {
    let segment = uri.rsplit('/').next().filter(|s| !s.is_empty())?;
    urlencoding::decode(segment).ok().map(|s| s.into_owned())
}

// ============================================================================
// Builder helpers
// ============================================================================

/// Builder for registering a tool
pub struct ToolBuilder {
    name: String,
    description: String,
    input_schema: Value,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn build<C, F, Fut>(self, handler: F) -> RegisteredTool<C>
    where
        F: Fn(C, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        RegisteredTool {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
            handler: Arc::new(move |ctx, params| Box::pin(handler(ctx, params))),
        }
    }
}

/// Builder for registering a resource
pub struct ResourceBuilder {
    uri_pattern: String,
    name: String,
    description: Option<String>,
    mime_type: Option<String>,
}

impl ResourceBuilder {
    pub fn new(uri_pattern: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri_pattern: uri_pattern.into(),
            name: name.into(),
            description: None,
            mime_type: None,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn build<C, F, Fut>(self, handler: F) -> RegisteredResource<C>
    where
        F: Fn(C, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResourceResult> + Send + 'static,
    {
        RegisteredResource {
            uri_pattern: self.uri_pattern,
            name: self.name,
            description: self.description,
            mime_type: self.mime_type,
            handler: Arc::new(move |ctx, uri| Box::pin(handler(ctx, uri))),
        }
    }
}
