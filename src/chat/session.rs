//! One conversation with the LLM and the MCP servers attached to it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::llm::{
    CompletionOptions, LlmError, LlmProvider, Message, MessageRole, ToolCall, ToolDefinition,
};
use crate::config::ChatSettings;
use crate::mcp::client::{McpClient, McpClientError};
use crate::mcp::protocol::{ToolDefinition as McpToolDefinition, ToolsCallResult};

const TOOL_OK_WITHOUT_TEXT: &str = "Tool executed successfully";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// A connected tool server as seen by the session.
#[async_trait]
pub trait McpConnection: Send + Sync {
    fn name(&self) -> &str;

    fn tools(&self) -> &[McpToolDefinition];

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolsCallResult, McpClientError>;

    async fn shutdown(&self);
}

#[async_trait]
impl McpConnection for McpClient {
    fn name(&self) -> &str {
        McpClient::name(self)
    }

    fn tools(&self) -> &[McpToolDefinition] {
        McpClient::tools(self)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolsCallResult, McpClientError> {
        McpClient::call_tool(self, name, arguments).await
    }

    async fn shutdown(&self) {
        McpClient::shutdown(self).await
    }
}

/// What happened to one tool call during a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool: String,
    /// Connection that served the call, `None` when no server has the tool
    pub server: Option<String>,
    pub is_error: bool,
    /// Text fed back to the LLM
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub tool_invocations: Vec<ToolInvocation>,
}

pub struct ChatSession {
    llm: Arc<dyn LlmProvider>,
    connections: BTreeMap<String, Arc<dyn McpConnection>>,
    history: Vec<Message>,
    settings: ChatSettings,
}

impl ChatSession {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: ChatSettings) -> Self {
        let mut session = Self {
            llm,
            connections: BTreeMap::new(),
            history: Vec::new(),
            settings,
        };
        session.reset();
        session
    }

    pub fn llm(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    pub fn set_llm(&mut self, llm: Arc<dyn LlmProvider>) {
        self.llm = llm;
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Apply new settings, keeping the conversation. A changed system
    /// prompt replaces the old one in place.
    pub fn update_settings(&mut self, settings: ChatSettings) {
        if settings.system_prompt != self.settings.system_prompt {
            if matches!(self.history.first(), Some(m) if m.role == MessageRole::System) {
                self.history.remove(0);
            }
            if let Some(prompt) = &settings.system_prompt {
                self.history.insert(0, Message::system(prompt.clone()));
            }
        }
        self.settings = settings;
    }

    /// Forget the conversation, keeping the system prompt.
    pub fn reset(&mut self) {
        self.history.clear();
        if let Some(prompt) = &self.settings.system_prompt {
            self.history.push(Message::system(prompt.clone()));
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Register a connection, returning the one it replaced.
    pub fn add_connection(
        &mut self,
        connection: Arc<dyn McpConnection>,
    ) -> Option<Arc<dyn McpConnection>> {
        self.connections
            .insert(connection.name().to_string(), connection)
    }

    pub fn remove_connection(&mut self, name: &str) -> Option<Arc<dyn McpConnection>> {
        self.connections.remove(name)
    }

    pub fn connection(&self, name: &str) -> Option<&Arc<dyn McpConnection>> {
        self.connections.get(name)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Arc<dyn McpConnection>> {
        self.connections.values()
    }

    /// Remove every connection, for shutting them down.
    pub fn take_connections(&mut self) -> Vec<Arc<dyn McpConnection>> {
        std::mem::take(&mut self.connections).into_values().collect()
    }

    /// First connection, by name order, that advertises `tool`.
    pub fn find_connection_for_tool(&self, tool: &str) -> Option<&Arc<dyn McpConnection>> {
        self.connections
            .values()
            .find(|c| c.tools().iter().any(|t| t.name == tool))
    }

    /// Every connected tool in function-calling form. A name advertised by
    /// two servers is offered once, for the server calls are routed to.
    pub fn available_tools(&self) -> Vec<ToolDefinition> {
        let mut seen = std::collections::BTreeSet::new();
        self.connections
            .values()
            .flat_map(|c| c.tools().iter())
            .filter(|t| seen.insert(t.name.clone()))
            .map(ToolDefinition::from)
            .collect()
    }

    fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            timeout: self.settings.request_timeout,
        }
    }

    /// Run one user turn. On failure the conversation is left as it was
    /// before the turn.
    pub async fn send(&mut self, user_text: &str) -> Result<ChatReply, ChatError> {
        let checkpoint = self.history.len();
        self.history.push(Message::user(user_text));

        let result = self.run_turn().await;
        if result.is_err() {
            self.history.truncate(checkpoint);
        }
        result
    }

    async fn run_turn(&mut self) -> Result<ChatReply, ChatError> {
        let options = self.completion_options();
        let mut tool_invocations = Vec::new();
        let mut round = 0;

        loop {
            let tools = if round < self.settings.max_tool_rounds {
                self.available_tools()
            } else {
                Vec::new()
            };
            let offered = (!tools.is_empty()).then_some(tools.as_slice());

            debug!(
                round = round,
                tool_count = tools.len(),
                "Requesting completion"
            );
            let response = self.llm.complete(&self.history, offered, &options).await?;
            let calls = response.message.requested_tools().to_vec();

            // Calls are only honoured when tools were offered
            if calls.is_empty() || offered.is_none() {
                if !calls.is_empty() {
                    warn!("Ignoring {} tool calls requested without tools", calls.len());
                }
                let content = response.message.content;
                self.history.push(Message::assistant(content.clone()));
                return Ok(ChatReply {
                    content,
                    tool_invocations,
                });
            }

            self.history.push(response.message);
            for call in &calls {
                let invocation = self.invoke(call).await;
                self.history.push(Message::tool_response(
                    &call.id,
                    &call.name,
                    &invocation.content,
                ));
                tool_invocations.push(invocation);
            }
            round += 1;
        }
    }

    async fn invoke(&self, call: &ToolCall) -> ToolInvocation {
        let Some(connection) = self.find_connection_for_tool(&call.name) else {
            warn!(tool = %call.name, "No connected server provides this tool");
            return ToolInvocation {
                tool: call.name.clone(),
                server: None,
                is_error: true,
                content: format!("Error executing tool: Unknown tool: {}", call.name),
            };
        };

        info!(tool = %call.name, server = %connection.name(), "Calling tool");
        let (content, is_error) = match connection
            .call_tool(&call.name, call.arguments.clone())
            .await
        {
            Ok(result) => (
                result
                    .first_text()
                    .unwrap_or(TOOL_OK_WITHOUT_TEXT)
                    .to_string(),
                result.is_error(),
            ),
            Err(e) => {
                warn!(tool = %call.name, "Tool call failed: {}", e);
                (format!("Error executing tool: {}", e), true)
            }
        };

        ToolInvocation {
            tool: call.name.clone(),
            server: Some(connection.name().to_string()),
            is_error,
            content,
        }
    }
}
