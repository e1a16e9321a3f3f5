//! MCP client over a child process
//!
//! Spawns an adapter, performs the `initialize` handshake and exchanges
//! newline-delimited JSON-RPC messages on its stdin/stdout. The child's
//! stderr is forwarded into our own log.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::protocol::{
    methods, ClientInfo, InitializeParams, InitializeResult, McpRequest, McpResponse, RequestId,
    ToolDefinition, ToolsCallParams, ToolsCallResult, ToolsListResult, MCP_PROTOCOL_VERSION,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// How to launch an MCP server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerSpec {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Start the child from an empty environment plus `env`
    #[serde(default)]
    pub clear_env: bool,
}

impl McpServerSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            clear_env: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum McpClientError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to talk to MCP server: {0}")]
    Io(#[from] std::io::Error),

    #[error("MCP protocol violation: {0}")]
    Protocol(String),

    #[error("MCP server error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("MCP server exited (code={code:?})")]
    Exited { code: Option<i32> },

    #[error("MCP request `{method}` timed out after {secs}s")]
    Timeout { method: String, secs: u64 },

    #[error("invalid MCP payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

struct Transport {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// A running MCP server that completed its handshake.
pub struct McpClient {
    spec: McpServerSpec,
    child: Mutex<Child>,
    transport: Mutex<Transport>,
    next_id: AtomicI64,
    request_timeout: Duration,
    initialize: InitializeResult,
    tools: Vec<ToolDefinition>,
}

impl McpClient {
    /// Spawn the server, run `initialize` and fetch its tool list.
    pub async fn connect(
        spec: McpServerSpec,
        request_timeout: Duration,
    ) -> Result<Self, McpClientError> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if spec.clear_env {
            cmd.env_clear();
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|source| McpClientError::Spawn {
            command: spec.command.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpClientError::Protocol("server stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpClientError::Protocol("server stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            let server = spec.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim_end();
                    if !line.is_empty() {
                        info!(target: "mcp.server.stderr", server = %server, "{line}");
                    }
                }
            });
        }

        let mut client = Self {
            spec,
            child: Mutex::new(child),
            transport: Mutex::new(Transport {
                stdin,
                stdout: BufReader::new(stdout),
            }),
            next_id: AtomicI64::new(1),
            request_timeout,
            initialize: placeholder_initialize(),
            tools: Vec::new(),
        };

        match client.handshake().await {
            Ok(()) => Ok(client),
            Err(e) => {
                client.kill().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<(), McpClientError> {
        let params = InitializeParams {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: Default::default(),
            client_info: ClientInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        let result = self
            .request_with_timeout(
                methods::INITIALIZE,
                Some(serde_json::to_value(params)?),
                HANDSHAKE_TIMEOUT,
            )
            .await?;
        self.initialize = serde_json::from_value(result)?;

        self.notify(methods::INITIALIZED).await?;

        let tools: ToolsListResult = serde_json::from_value(
            self.request_with_timeout(methods::TOOLS_LIST, None, HANDSHAKE_TIMEOUT)
                .await?,
        )?;
        self.tools = tools.tools;

        info!(
            server = %self.spec.name,
            "Connected to {} {} with {} tools",
            self.initialize.server_info.name,
            self.initialize.server_info.version,
            self.tools.len()
        );
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &McpServerSpec {
        &self.spec
    }

    pub fn server_info(&self) -> &InitializeResult {
        &self.initialize
    }

    /// Tools advertised during the handshake
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolsCallResult, McpClientError> {
        let params = ToolsCallParams {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        let result = self
            .request(methods::TOOLS_CALL, Some(serde_json::to_value(params)?))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Health check
    pub async fn ping(&self) -> Result<(), McpClientError> {
        self.request(methods::PING, None).await.map(|_| ())
    }

    /// Ask the server to stop, then make sure the process is gone.
    pub async fn shutdown(&self) {
        match tokio::time::timeout(SHUTDOWN_GRACE, self.request(methods::SHUTDOWN, None)).await {
            Ok(Ok(_)) => debug!(server = %self.spec.name, "Shutdown acknowledged"),
            Ok(Err(e)) => debug!(server = %self.spec.name, "Shutdown request failed: {}", e),
            Err(_) => debug!(server = %self.spec.name, "Shutdown request timed out"),
        }

        // Closing stdin ends the server loop even if it ignored shutdown
        {
            let mut transport = self.transport.lock().await;
            let _ = transport.stdin.shutdown().await;
        }

        let mut child = self.child.lock().await;
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => info!(server = %self.spec.name, "MCP server exited with {}", status),
            _ => {
                warn!(server = %self.spec.name, "MCP server did not exit, killing it");
                let _ = child.kill().await;
            }
        }
    }

    async fn kill(&self) {
        let mut child = self.child.lock().await;
        let _ = child.kill().await;
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpClientError> {
        self.request_with_timeout(method, params, self.request_timeout)
            .await
    }

    async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, McpClientError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = McpRequest::new(id.clone(), method, params);

        // Held across the whole exchange so responses cannot interleave
        let mut transport = self.transport.lock().await;

        let exchange = async {
            write_line(&mut transport.stdin, &request).await?;
            self.read_response(&mut transport.stdout, &id).await
        };

        let response = match tokio::time::timeout(timeout, exchange).await {
            Ok(response) => response?,
            Err(_) => {
                return Err(McpClientError::Timeout {
                    method: method.to_string(),
                    secs: timeout.as_secs(),
                })
            }
        };

        if let Some(error) = response.error {
            return Err(McpClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str) -> Result<(), McpClientError> {
        let mut transport = self.transport.lock().await;
        write_line(&mut transport.stdin, &McpRequest::notification(method)).await
    }

    async fn read_response(
        &self,
        stdout: &mut BufReader<ChildStdout>,
        id: &RequestId,
    ) -> Result<McpResponse, McpClientError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = stdout.read_line(&mut line).await?;
            if n == 0 {
                let code = self
                    .child
                    .lock()
                    .await
                    .try_wait()
                    .ok()
                    .flatten()
                    .and_then(|s| s.code());
                return Err(McpClientError::Exited { code });
            }

            let text = line.trim();
            if text.is_empty() {
                continue;
            }

            let value: Value = match serde_json::from_str(text) {
                Ok(value) => value,
                Err(_) => {
                    debug!(server = %self.spec.name, "Skipping non-JSON output: {}", text);
                    continue;
                }
            };

            // Server-initiated requests and notifications carry a method
            if value.get("method").is_some() {
                debug!(server = %self.spec.name, "Ignoring server message: {}", text);
                continue;
            }

            let response: McpResponse = serde_json::from_value(value)?;
            match &response.id {
                Some(rid) if rid == id => return Ok(response),
                other => {
                    debug!(server = %self.spec.name, "Skipping response for id {:?}", other);
                }
            }
        }
    }
}

async fn write_line(stdin: &mut ChildStdin, message: &McpRequest) -> Result<(), McpClientError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

fn placeholder_initialize() -> InitializeResult {
    InitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: Default::default(),
        server_info: super::protocol::ServerInfo {
            name: "unknown".to_string(),
            version: "unknown".to_string(),
        },
        instructions: None,
    }
}
