//! MCP stdio server
//!
//! Reads newline-delimited JSON-RPC messages, dispatches them against a
//! registry and writes one response line per request. Requests are handled
//! one at a time. Notifications never get a response.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use super::protocol::{
    methods, ClientInfo, InitializeParams, InitializeResult, McpError, McpRequest, McpResponse,
    PingResult, RequestId, ResourcesCapability, ResourcesListResult, ResourcesReadParams,
    ResourcesReadResult, ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCapability,
    ToolsListResult, MCP_PROTOCOL_VERSION,
};
use super::registry::McpRegistry;

/// Version string advertised in `serverInfo`
pub fn server_version() -> String {
    format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))
}

/// What the loop should do after a message has been handled
enum Flow {
    Continue,
    Stop,
}

pub struct McpServer<C> {
    registry: Arc<McpRegistry<C>>,
    context: C,
    server_info: ServerInfo,
    instructions: Option<String>,
}

impl<C> McpServer<C>
where
    C: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, registry: McpRegistry<C>, context: C) -> Self {
        info!(
            "MCP registry initialized with {} tools and {} resources",
            registry.tool_count(),
            registry.resource_count()
        );
        Self {
            registry: Arc::new(registry),
            context,
            server_info: ServerInfo {
                name: name.into(),
                version: server_version(),
            },
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Serve on the process stdin/stdout until EOF or `shutdown`.
    pub async fn serve_stdio(&self) -> anyhow::Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        let mut initialized = false;

        info!("{} ready on stdio", self.server_info.name);

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (response, flow) = self.handle_message(line, &mut initialized).await;

            if let Some(response) = response {
                match serde_json::to_string(&response) {
                    Ok(mut json) => {
                        json.push('\n');
                        writer.write_all(json.as_bytes()).await?;
                        writer.flush().await?;
                    }
                    Err(e) => {
                        error!("Failed to serialize MCP response: {}", e);
                    }
                }
            }

            if let Flow::Stop = flow {
                debug!("Shutdown requested");
                break;
            }
        }

        info!("{} stopped", self.server_info.name);
        Ok(())
    }

    /// Handle a single MCP message
    async fn handle_message(&self, text: &str, initialized: &mut bool) -> (Option<McpResponse>, Flow) {
        let request: McpRequest = match serde_json::from_str(text) {
            Ok(req) => req,
            Err(e) => {
                warn!("Unparseable MCP message: {}", e);
                return (
                    Some(McpResponse::error(None, McpError::ParseError(e.to_string()))),
                    Flow::Continue,
                );
            }
        };

        let Some(request_id) = request.id.clone() else {
            match request.method.as_str() {
                methods::INITIALIZED => debug!("Client finished initialization"),
                methods::SHUTDOWN => return (None, Flow::Stop),
                other => debug!("Ignoring notification {}", other),
            }
            return (None, Flow::Continue);
        };

        debug!(method = %request.method, id = %request_id, "MCP request");

        let result = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(&request, initialized),
            methods::PING => to_value(PingResult {}),
            methods::SHUTDOWN => {
                return (
                    Some(McpResponse::success(request_id, serde_json::json!({}))),
                    Flow::Stop,
                );
            }
            methods::TOOLS_LIST
            | methods::TOOLS_CALL
            | methods::RESOURCES_LIST
            | methods::RESOURCES_READ
                if !*initialized =>
            {
                Err(McpError::InvalidRequest("Not initialized".to_string()))
            }
            methods::TOOLS_LIST => to_value(ToolsListResult {
                tools: self.registry.tool_definitions(),
            }),
            methods::TOOLS_CALL => self.handle_tools_call(&request_id, request.params).await,
            methods::RESOURCES_LIST => to_value(ResourcesListResult {
                resources: self.registry.resource_definitions(),
            }),
            methods::RESOURCES_READ => self.handle_resources_read(request.params).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        };

        let response = match result {
            Ok(value) => McpResponse::success(request_id, value),
            Err(error) => McpResponse::error(Some(request_id), error),
        };
        (Some(response), Flow::Continue)
    }

    fn handle_initialize(
        &self,
        request: &McpRequest,
        initialized: &mut bool,
    ) -> Result<Value, McpError> {
        let params: InitializeParams = parse_params(request.params.clone())?.unwrap_or_else(|| {
            InitializeParams {
                protocol_version: MCP_PROTOCOL_VERSION.to_string(),
                capabilities: Default::default(),
                client_info: ClientInfo {
                    name: "unknown".to_string(),
                    version: "unknown".to_string(),
                },
            }
        });

        info!(
            "Initialize from {} {} (protocol {})",
            params.client_info.name, params.client_info.version, params.protocol_version
        );
        *initialized = true;

        to_value(InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: None }),
                resources: Some(ResourcesCapability {
                    subscribe: Some(false),
                    list_changed: None,
                }),
            },
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        })
    }

    async fn handle_tools_call(
        &self,
        request_id: &RequestId,
        params: Option<Value>,
    ) -> Result<Value, McpError> {
        let params: ToolsCallParams = parse_params(params)?
            .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;

        let tool = self
            .registry
            .get_tool(&params.name)
            .ok_or_else(|| McpError::MethodNotFound(format!("Unknown tool: {}", params.name)))?;

        info!(tool = %params.name, id = %request_id, "Calling tool");

        let arguments = match params.arguments {
            Some(Value::Null) | None => serde_json::json!({}),
            Some(args) => args,
        };
        let result = (tool.handler)(self.context.clone(), arguments).await?;

        if result.is_error() {
            warn!(tool = %params.name, "Tool reported an error");
        }

        to_value(result)
    }

    async fn handle_resources_read(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: ResourcesReadParams = parse_params(params)?
            .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;

        let resource = self
            .registry
            .find_resource(&params.uri)
            .ok_or_else(|| McpError::ResourceNotFound(params.uri.clone()))?;

        let contents = (resource.handler)(self.context.clone(), params.uri).await?;

        to_value(ResourcesReadResult { contents })
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<Option<T>, McpError> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError(e.to_string()))
}
