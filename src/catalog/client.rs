//! HTTP client for the OpenMetadata REST API.

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{
    ApiErrorBody, LoginRequest, LoginResponse, ServerVersion, Table, TableList,
};
use crate::config::{CatalogAuth, CatalogSettings};

const TABLE_FIELDS: &str = "columns,tableConstraints";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("OpenMetadata is not configured, missing: {}", .0.join(", "))]
    NotConfigured(Vec<&'static str>),

    #[error("Request to OpenMetadata failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenMetadata returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("OpenMetadata login failed: {0}")]
    Login(String),
}

impl CatalogError {
    /// The catalog's own message for API errors, the full text otherwise.
    pub fn service_message(&self) -> String {
        match self {
            CatalogError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::Api { status: 404, .. })
    }
}

/// Read access to the catalog. Implemented over HTTP by
/// [`OpenMetadataClient`].
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Server root the client talks to, if configured
    fn host(&self) -> Option<&str>;

    async fn server_version(&self) -> Result<ServerVersion, CatalogError>;

    async fn list_tables(&self, limit: u32) -> Result<TableList, CatalogError>;

    async fn get_table_by_name(&self, fqn: &str) -> Result<Table, CatalogError>;

    async fn get_table_by_id(&self, id: &str) -> Result<Table, CatalogError>;
}

pub struct OpenMetadataClient {
    client: reqwest::Client,
    settings: CatalogSettings,
    /// Token obtained through the login endpoint
    session_token: Mutex<Option<String>>,
}

impl OpenMetadataClient {
    pub fn new(settings: CatalogSettings) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            settings,
            session_token: Mutex::new(None),
        })
    }

    fn api_base(&self) -> Result<String, CatalogError> {
        self.settings
            .api_base()
            .ok_or_else(|| CatalogError::NotConfigured(self.settings.missing_vars()))
    }

    async fn bearer_token(&self, api_base: &str) -> Result<Option<String>, CatalogError> {
        match &self.settings.auth {
            CatalogAuth::Jwt(token) => Ok(Some(token.clone())),
            CatalogAuth::None => Ok(None),
            CatalogAuth::Login { username, password } => {
                let mut cached = self.session_token.lock().await;
                if let Some(token) = cached.as_ref() {
                    return Ok(Some(token.clone()));
                }

                info!("Logging in to OpenMetadata as {}", username);
                let body = LoginRequest {
                    email: username,
                    password: base64::engine::general_purpose::STANDARD.encode(password),
                };
                let response = self
                    .client
                    .post(format!("{}/users/login", api_base))
                    .json(&body)
                    .send()
                    .await?;

                if !response.status().is_success() {
                    let status = response.status();
                    let message = error_message(status, response.text().await.unwrap_or_default());
                    return Err(CatalogError::Login(message));
                }

                let login: LoginResponse = response.json().await?;
                *cached = Some(login.access_token.clone());
                Ok(Some(login.access_token))
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let api_base = self.api_base()?;
        let url = format!("{}{}", api_base, path);
        debug!("GET {}", url);

        let mut request = self.client.get(&url).query(query);
        if let Some(token) = self.bearer_token(&api_base).await? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                // Expired session tokens are fetched again on the next call
                *self.session_token.lock().await = None;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: error_message(status, body),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CatalogApi for OpenMetadataClient {
    fn host(&self) -> Option<&str> {
        self.settings.host.as_deref()
    }

    async fn server_version(&self) -> Result<ServerVersion, CatalogError> {
        self.get_json("/system/version", &[]).await
    }

    async fn list_tables(&self, limit: u32) -> Result<TableList, CatalogError> {
        self.get_json("/tables", &[("limit", limit.to_string())])
            .await
    }

    async fn get_table_by_name(&self, fqn: &str) -> Result<Table, CatalogError> {
        let path = format!("/tables/name/{}", urlencoding::encode(fqn));
        self.get_json(&path, &[("fields", TABLE_FIELDS.to_string())])
            .await
    }

    async fn get_table_by_id(&self, id: &str) -> Result<Table, CatalogError> {
        let path = format!("/tables/{}", urlencoding::encode(id));
        self.get_json(&path, &[("fields", TABLE_FIELDS.to_string())])
            .await
    }
}

/// The `message` field of an OpenMetadata error body, else the raw body, else
/// the status reason.
fn error_message(status: StatusCode, body: String) -> String {
    if let Ok(ApiErrorBody {
        message: Some(message),
    }) = serde_json::from_str::<ApiErrorBody>(&body)
    {
        return message;
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}
