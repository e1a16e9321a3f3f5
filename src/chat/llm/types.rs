//! Provider-neutral conversation types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::protocol::ToolDefinition as McpToolDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Set on assistant messages that ask for tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Set on tool messages: the call being answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on tool messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    fn plain(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(MessageRole::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::plain(MessageRole::Assistant, content)
        }
    }

    /// Answer to the tool call `tool_call_id`.
    pub fn tool_response(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::plain(MessageRole::Tool, content)
        }
    }

    pub fn requested_tools(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// One function call asked for by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Id echoed back in the tool message
    pub id: String,
    pub name: String,
    /// Decoded arguments, `{}` when the model sent invalid JSON
    pub arguments: Value,
}

/// A function the model may call, in the shape the chat completions API
/// expects.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments
    pub parameters: Value,
}

impl From<&McpToolDefinition> for ToolDefinition {
    fn from(def: &McpToolDefinition) -> Self {
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: def.input_schema.clone(),
        }
    }
}

/// One completion: the assistant message and why generation stopped.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub message: Message,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of response.
    Stop,
    /// Model wants to call tools.
    ToolCalls,
    /// `max_tokens` reached
    MaxTokens,
    /// Response withheld by the content filter.
    ContentFilter,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_round_messages() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "list_om_tables".to_string(),
            arguments: serde_json::json!({"limit": 3}),
        };
        let request = Message::assistant_with_tools("", vec![call.clone()]);
        assert_eq!(request.role, MessageRole::Assistant);
        assert_eq!(request.requested_tools(), &[call]);
        assert!(Message::assistant("done").requested_tools().is_empty());

        let answer = Message::tool_response("call_1", "list_om_tables", "3 tables");
        assert_eq!(answer.role, MessageRole::Tool);
        assert_eq!(answer.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(answer.tool_name.as_deref(), Some("list_om_tables"));
        assert_eq!(answer.content, "3 tables");
    }

    #[test]
    fn test_tool_definition_from_mcp() {
        let mcp = McpToolDefinition {
            name: "get_postgres_schema".to_string(),
            description: "Describe a table".to_string(),
            input_schema: serde_json::json!({"type": "object", "required": ["table_name"]}),
        };
        let def = ToolDefinition::from(&mcp);
        assert_eq!(def.name, "get_postgres_schema");
        assert_eq!(def.parameters["required"][0], "table_name");
    }
}
