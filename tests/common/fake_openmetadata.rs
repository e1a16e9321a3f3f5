//! In-process fake of the OpenMetadata REST endpoints the catalog client uses.

use super::constants::*;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeCatalogAuth {
    /// Requests must carry `OM_JWT_TOKEN`
    Jwt,
    /// Requests must carry the token returned by the login endpoint
    Login,
}

struct FakeState {
    auth: FakeCatalogAuth,
    tables: Vec<Value>,
    logins: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

/// Fake OpenMetadata server. Shuts down when dropped.
pub struct FakeOpenMetadata {
    /// Server root, e.g. "http://127.0.0.1:12345"
    pub base_url: String,
    state: Arc<FakeState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeOpenMetadata {
    pub async fn spawn(auth: FakeCatalogAuth) -> Self {
        let state = Arc::new(FakeState {
            auth,
            tables: sample_tables(),
            logins: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/v1/system/version", get(version))
            .route("/api/v1/users/login", post(login))
            .route("/api/v1/tables", get(list_tables))
            .route("/api/v1/tables/name/{fqn}", get(table_by_name))
            .route("/api/v1/tables/{id}", get(table_by_id))
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
                .expect("Fake OpenMetadata server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn login_count(&self) -> usize {
        self.state.logins.load(Ordering::SeqCst)
    }

    /// Paths of the authenticated requests received so far
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }
}

fn sample_tables() -> Vec<Value> {
    vec![
        json!({
            "id": ORDERS_ID,
            "name": "orders",
            "fullyQualifiedName": ORDERS_FQN,
            "description": "<p>All <b>customer</b> orders</p>",
            "tableType": "Regular",
            "columns": [
                {"name": "order_id", "dataType": "BIGINT", "dataTypeDisplay": "bigint", "constraint": "PRIMARY_KEY"},
                {"name": "customer_id", "dataType": "BIGINT", "description": "Buyer"},
                {"name": "total", "dataType": "NUMERIC", "dataTypeDisplay": "numeric(10,2)"}
            ],
            "tableConstraints": [
                {"constraintType": "FOREIGN_KEY", "columns": ["customer_id"]}
            ]
        }),
        json!({
            "id": CUSTOMERS_ID,
            "name": "customers",
            "fullyQualifiedName": CUSTOMERS_FQN,
            "columns": [
                {"name": "customer_id", "dataType": "BIGINT"},
                {"name": "email", "dataType": "VARCHAR", "dataTypeDisplay": "varchar(255)"}
            ]
        }),
    ]
}

fn error(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(json!({"code": status.as_u16(), "message": message})),
    )
        .into_response()
}

/// Checks the bearer token and records the request.
fn authorize(state: &FakeState, headers: &HeaderMap, path: String) -> Result<(), Response> {
    let expected = match state.auth {
        FakeCatalogAuth::Jwt => OM_JWT_TOKEN,
        FakeCatalogAuth::Login => OM_SESSION_TOKEN,
    };
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented != Some(expected) {
        return Err(error(
            StatusCode::UNAUTHORIZED,
            "Not Authorized! Token not present".to_string(),
        ));
    }
    state.requests.lock().unwrap().push(path);
    Ok(())
}

async fn version(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers, "/system/version".to_string()) {
        return response;
    }
    Json(json!({"version": OM_VERSION, "revision": "abc123"})).into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Arc<FakeState>>, Json(body): Json<LoginBody>) -> Response {
    let password = base64::engine::general_purpose::STANDARD
        .decode(&body.password)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());
    if body.email != OM_USERNAME || password.as_deref() != Some(OM_PASSWORD) {
        return error(
            StatusCode::UNAUTHORIZED,
            "You have entered an invalid username or password.".to_string(),
        );
    }
    state.logins.fetch_add(1, Ordering::SeqCst);
    Json(json!({"accessToken": OM_SESSION_TOKEN, "tokenType": "Bearer"})).into_response()
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_tables(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Err(response) = authorize(&state, &headers, "/tables".to_string()) {
        return response;
    }
    let limit = query.limit.unwrap_or(10);
    let data: Vec<Value> = state.tables.iter().take(limit).cloned().collect();
    Json(json!({"data": data, "paging": {"total": state.tables.len()}})).into_response()
}

async fn table_by_name(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(fqn): Path<String>,
) -> Response {
    if let Err(response) = authorize(&state, &headers, format!("/tables/name/{}", fqn)) {
        return response;
    }
    match state
        .tables
        .iter()
        .find(|t| t["fullyQualifiedName"] == fqn.as_str())
    {
        Some(table) => Json(table.clone()).into_response(),
        None => error(
            StatusCode::NOT_FOUND,
            format!("table instance for {} not found", fqn),
        ),
    }
}

async fn table_by_id(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = authorize(&state, &headers, format!("/tables/{}", id)) {
        return response;
    }
    match state.tables.iter().find(|t| t["id"] == id.as_str()) {
        Some(table) => Json(table.clone()).into_response(),
        None => error(
            StatusCode::NOT_FOUND,
            format!("table instance for {} not found", id),
        ),
    }
}
