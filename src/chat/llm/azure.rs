//! Azure OpenAI chat completions provider.
//!
//! Deployments are addressed by URL
//! (`{endpoint}/openai/deployments/{deployment}/chat/completions`) and
//! authenticated with the `api-key` header.

use super::provider::{CompletionOptions, LlmError, LlmProvider};
use super::types::{
    CompletionResponse, FinishReason, Message, MessageRole, TokenUsage, ToolCall, ToolDefinition,
};
use crate::config::LlmSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub struct AzureOpenAIProvider {
    client: Client,
    settings: LlmSettings,
}

impl AzureOpenAIProvider {
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.settings.endpoint,
            urlencoding::encode(&self.settings.deployment),
            urlencoding::encode(&self.settings.api_version)
        )
    }
}

#[async_trait]
impl LlmProvider for AzureOpenAIProvider {
    fn name(&self) -> &str {
        "azure-openai"
    }

    fn model(&self) -> &str {
        &self.settings.deployment
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        let tools = tools.filter(|t| !t.is_empty());
        let request = ChatRequest {
            messages: messages.iter().map(Into::into).collect(),
            tool_choice: tools.map(|_| "auto"),
            tools: tools.map(|t| t.iter().map(Into::into).collect()),
            temperature: Some(options.temperature),
            max_tokens: options.max_tokens,
        };

        debug!(
            deployment = %self.settings.deployment,
            message_count = messages.len(),
            tool_count = tools.map(|t| t.len()).unwrap_or(0),
            "Sending completion request to Azure OpenAI"
        );

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.settings.api_key)
            .json(&request)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse Azure OpenAI response: {}", e))
        })?;

        let choice = chat_response.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("No choices in Azure OpenAI response".to_string())
        })?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                    warn!(tool = %tc.function.name, "Tool arguments are not valid JSON: {}", e);
                    serde_json::Value::Object(serde_json::Map::new())
                });
                ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                }
            })
            .collect();
        let has_tool_calls = !tool_calls.is_empty();

        let content = choice.message.content.unwrap_or_default();
        let message = if has_tool_calls {
            Message::assistant_with_tools(content, tool_calls)
        } else {
            Message::assistant(content)
        };

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("length") => FinishReason::MaxTokens,
            Some("content_filter") => FinishReason::ContentFilter,
            _ if has_tool_calls => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        };

        let usage = chat_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        debug!(
            finish_reason = ?finish_reason,
            has_tool_calls = has_tool_calls,
            total_tokens = usage.map(|u| u.total_tokens).unwrap_or(0),
            "Received completion response from Azure OpenAI"
        );

        Ok(CompletionResponse {
            message,
            finish_reason,
            usage,
        })
    }
}

/// `error.message` of an Azure error body, else the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or(body)
}

// Chat completions wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };

        // Tool results must always carry content, even when empty
        let content = if msg.content.is_empty() && msg.role != MessageRole::Tool {
            None
        } else {
            Some(msg.content.clone())
        };

        ChatMessage {
            role,
            content,
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|tc| ToolCallRequest {
                        id: tc.id.clone(),
                        r#type: "function",
                        function: FunctionCall {
                            name: tc.name.clone(),
                            arguments: tc.arguments.to_string(),
                        },
                    })
                    .collect()
            }),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ToolCallRequest {
    id: String,
    r#type: &'static str,
    function: FunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: FunctionDef,
}

impl From<&ToolDefinition> for ChatTool {
    fn from(def: &ToolDefinition) -> Self {
        ChatTool {
            tool_type: "function",
            function: FunctionDef {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct FunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallResponse {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> LlmSettings {
        LlmSettings {
            endpoint: "https://example.openai.azure.com".to_string(),
            api_key: "key".to_string(),
            deployment: "gpt 4o".to_string(),
            api_version: "2024-02-01".to_string(),
        }
    }

    #[test]
    fn test_completions_url() {
        let provider = AzureOpenAIProvider::new(settings());
        assert_eq!(
            provider.completions_url(),
            "https://example.openai.azure.com/openai/deployments/gpt%204o/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn test_assistant_tool_call_conversion() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "list_om_tables".to_string(),
                arguments: json!({"limit": 5}),
            }],
        );
        let wire = serde_json::to_value(ChatMessage::from(&msg)).unwrap();
        assert_eq!(
            wire,
            json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "list_om_tables", "arguments": "{\"limit\":5}"}
                }]
            })
        );
    }

    #[test]
    fn test_tool_message_conversion() {
        let msg = Message::tool_response("call_123", "debug_env", "");
        let wire = serde_json::to_value(ChatMessage::from(&msg)).unwrap();
        assert_eq!(
            wire,
            json!({"role": "tool", "content": "", "tool_call_id": "call_123"})
        );
    }

    #[test]
    fn test_tool_definition_conversion() {
        let def = ToolDefinition {
            name: "get_om_table".to_string(),
            description: "Get a table".to_string(),
            parameters: json!({"type": "object"}),
        };
        let wire = serde_json::to_value(ChatTool::from(&def)).unwrap();
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "get_om_table");
        assert_eq!(wire["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_api_error_message() {
        assert_eq!(
            api_error_message(
                r#"{"error":{"code":"DeploymentNotFound","message":"The deployment does not exist."}}"#
                    .to_string()
            ),
            "The deployment does not exist."
        );
        assert_eq!(api_error_message("plain".to_string()), "plain");
    }
}
