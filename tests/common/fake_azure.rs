//! In-process fake of the Azure OpenAI chat completions endpoint.
//!
//! Replies are scripted: each request pops the next queued response body.

use super::constants::*;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct FakeState {
    replies: Mutex<VecDeque<(StatusCode, Value)>>,
    requests: Mutex<Vec<Value>>,
}

/// Fake Azure OpenAI resource. Shuts down when dropped.
pub struct FakeAzure {
    pub endpoint: String,
    state: Arc<FakeState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeAzure {
    pub async fn spawn() -> Self {
        let state = Arc::new(FakeState::default());

        let app = Router::new()
            .route(
                "/openai/deployments/{deployment}/chat/completions",
                post(chat_completions),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener.local_addr().expect("Failed to get local address").port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Fake Azure server failed");
        });

        Self {
            endpoint: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Queue a plain assistant answer.
    pub fn reply_text(&self, content: &str) {
        self.reply_raw(StatusCode::OK, completion(json!({"role": "assistant", "content": content}), "stop"));
    }

    /// Queue an answer requesting one tool call. `arguments` is sent as the
    /// raw JSON string the API would produce.
    pub fn reply_tool_call(&self, id: &str, name: &str, arguments: &str) {
        self.reply_raw(
            StatusCode::OK,
            completion(
                json!({
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": id,
                        "type": "function",
                        "function": {"name": name, "arguments": arguments}
                    }]
                }),
                "tool_calls",
            ),
        );
    }

    pub fn reply_raw(&self, status: StatusCode, body: Value) {
        self.state.replies.lock().unwrap().push_back((status, body));
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

fn completion(message: Value, finish_reason: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": message, "finish_reason": finish_reason}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
    })
}

#[derive(Deserialize)]
struct ApiVersion {
    #[serde(rename = "api-version")]
    api_version: Option<String>,
}

async fn chat_completions(
    State(state): State<Arc<FakeState>>,
    Path(deployment): Path<String>,
    Query(query): Query<ApiVersion>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let error = |status: StatusCode, code: &str, message: &str| {
        (
            status,
            Json(json!({"error": {"code": code, "message": message}})),
        )
            .into_response()
    };

    if headers.get("api-key").and_then(|v| v.to_str().ok()) != Some(AZURE_API_KEY) {
        return error(
            StatusCode::UNAUTHORIZED,
            "401",
            "Access denied due to invalid subscription key or wrong API endpoint.",
        );
    }
    if deployment != AZURE_DEPLOYMENT {
        return error(
            StatusCode::NOT_FOUND,
            "DeploymentNotFound",
            "The API deployment for this resource does not exist.",
        );
    }
    if query.api_version.as_deref() != Some(AZURE_API_VERSION) {
        return error(StatusCode::NOT_FOUND, "404", "Resource not found");
    }

    state.requests.lock().unwrap().push(body);
    match state.replies.lock().unwrap().pop_front() {
        Some((status, body)) => (status, Json(body)).into_response(),
        None => error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "NoScriptedReply",
            "No reply queued",
        ),
    }
}
