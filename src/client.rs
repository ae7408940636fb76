//! Buddy REST client.
//!
//! Resource handlers talk to the API through the [`BuddyApi`] trait so tests
//! can swap the HTTP transport for an in-memory double
//! ([`crate::testing::FakeBuddyApi`]).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::ProviderError;

const USER_AGENT: &str = concat!("pulumi-resource-buddy/", env!("CARGO_PKG_VERSION"));

/// JSON-over-HTTP access to the Buddy API.
///
/// Paths are absolute API paths such as `/workspaces/acme/projects`.
#[async_trait]
pub trait BuddyApi: Send + Sync {
    /// `GET` a resource.
    async fn get(&self, path: &str) -> Result<Value, ProviderError>;

    /// `POST` a new resource and return the created representation.
    async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError>;

    /// `PATCH` a resource and return the updated representation.
    async fn patch(&self, path: &str, body: &Value) -> Result<Value, ProviderError>;

    /// `DELETE` a resource.
    async fn delete(&self, path: &str) -> Result<(), ProviderError>;
}

/// [`BuddyApi`] over HTTPS with bearer-token authentication.
pub struct HttpBuddyApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for HttpBuddyApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBuddyApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpBuddyApi {
    /// Build a client from resolved provider settings.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, method: &str, path: &str, request: RequestBuilder) -> Result<Value, ProviderError> {
        debug!(method, path, "Buddy API request");
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(method, path, status = status.as_u16(), "Buddy API response");

        if !status.is_success() {
            return Err(ProviderError::from_status(
                status.as_u16(),
                error_message(&text, status),
            ));
        }
        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl BuddyApi for HttpBuddyApi {
    async fn get(&self, path: &str) -> Result<Value, ProviderError> {
        let request = self.client.get(self.url(path));
        self.send("GET", path, request).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let request = self.client.post(self.url(path)).json(body);
        self.send("POST", path, request).await
    }

    async fn patch(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let request = self.client.patch(self.url(path)).json(body);
        self.send("PATCH", path, request).await
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        let request = self.client.delete(self.url(path));
        self.send("DELETE", path, request).await.map(|_| ())
    }
}

/// Extract the API's error text, which arrives as `{"errors":[{"message":..}]}`.
fn error_message(body: &str, status: StatusCode) -> String {
    let messages: Vec<String> = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json.get("errors").and_then(Value::as_array).cloned())
        .unwrap_or_default()
        .iter()
        .filter_map(|err| err.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    if !messages.is_empty() {
        messages.join("; ")
    } else if !body.trim().is_empty() {
        body.trim().to_string()
    } else {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    }
}

/// A workspace-bound handle on the API.
#[derive(Clone)]
pub struct Client {
    api: Arc<dyn BuddyApi>,
    workspace: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Bind `api` to a workspace.
    pub fn new(api: Arc<dyn BuddyApi>, workspace: impl Into<String>) -> Self {
        Self {
            api,
            workspace: workspace.into(),
        }
    }

    /// The workspace domain.
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// Prefix `path` with the workspace, e.g. `/projects` becomes
    /// `/workspaces/acme/projects`.
    pub fn workspace_path(&self, path: &str) -> String {
        format!("/workspaces/{}{}", self.workspace, path)
    }

    /// The underlying API.
    pub fn api(&self) -> &dyn BuddyApi {
        self.api.as_ref()
    }

    /// `GET` a path.
    pub async fn get(&self, path: &str) -> Result<Value, ProviderError> {
        self.api.get(path).await
    }

    /// `POST` to a path.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        self.api.post(path, body).await
    }

    /// `PATCH` a path.
    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        self.api.patch(path, body).await
    }

    /// `DELETE` a path.
    pub async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.api.delete(path).await
    }
}
