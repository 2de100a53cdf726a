//! REST API client for the workflow instance endpoints.
//!
//! Wraps the console's HTTP API (listing, creation, lifecycle commands,
//! deletion) using [`reqwest`]. Every request carries the configured bearer
//! token. Responses may be bare JSON or wrapped in a `{ "data": ... }`
//! envelope.

use std::time::Duration;

use opsdeck_core::types::{null_as_default, ProjectId};
use opsdeck_core::workflow_instance::{NewInstance, WorkflowInstance};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Path segment under the base URL that hosts the instance resources.
const INSTANCES_PATH: &str = "workflow-instances";

/// Connection settings for [`ConsoleApi`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base API URL, e.g. `https://console.example.com/api/v1`.
    pub base_url: String,
    /// Pre-issued bearer token; obtaining and refreshing it is the caller's
    /// concern.
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// HTTP client for one console backend.
pub struct ConsoleApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

/// Query for one page of instances belonging to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceQuery {
    pub project_id: ProjectId,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

/// One page of instances plus the total across all pages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstancePage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<WorkflowInstance>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
}

/// Decode a body that is either `{ "data": T }` or a bare `T`.
///
/// The envelope is unwrapped first so a decode error names the offending
/// field of `T` rather than the envelope.
fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    let mut value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(e.to_string()))?;
    let wrapped = value.as_object_mut().and_then(|map| map.remove("data"));
    if let Some(data) = wrapped {
        value = data;
    }
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Errors from the console REST API layer.
///
/// Callers treat every variant as "the action failed"; the variants only
/// shape the message shown to the operator.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The configured base URL cannot carry path segments.
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Request failed: {0}")]
    Transport(String),

    /// The backend refused the request (4xx), e.g. a failed precondition.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend failed while handling the request (5xx).
    #[error("Backend error ({status}): {message}")]
    Server { status: u16, message: String },

    /// A success response whose body could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-2xx response by status code, pulling a readable
    /// message out of the body when it has one.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body);
        if status >= 500 {
            Self::Server { status, message }
        } else {
            Self::Rejected { status, message }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Pick the human-readable part of an error body.
///
/// Understands `{"error": "..."}`, `{"message": "..."}` and `{"detail": "..."}`;
/// anything else is returned trimmed.
fn extract_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message", "detail"] {
            if let Some(serde_json::Value::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "<empty response body>".to_string()
    } else {
        trimmed.to_string()
    }
}

impl ConsoleApi {
    /// Build a client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let base_url = parse_base_url(&config.base_url)?;
        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across consoles).
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        token: Option<String>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch one page of a project's instances.
    ///
    /// Sends `GET /workflow-instances?project_id=&page=&page_size=`.
    pub async fn list_instances(&self, query: &InstanceQuery) -> Result<InstancePage, ApiError> {
        let url = self.endpoint(&[])?;
        let response = self
            .authorized(self.client.get(url))
            .query(query)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Create an empty instance.
    ///
    /// Sends `POST /workflow-instances` and returns the created record.
    pub async fn create_instance(&self, body: &NewInstance) -> Result<WorkflowInstance, ApiError> {
        let url = self.endpoint(&[])?;
        let response = self
            .authorized(self.client.post(url))
            .json(body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Ask the backend to start an instance.
    pub async fn start_instance(&self, id: &str) -> Result<(), ApiError> {
        self.post_command(id, "start").await
    }

    /// Ask the backend to stop an instance.
    pub async fn stop_instance(&self, id: &str) -> Result<(), ApiError> {
        self.post_command(id, "stop").await
    }

    /// Ask the backend to re-pull the instance's status from the
    /// orchestrator.
    pub async fn sync_instance_status(&self, id: &str) -> Result<(), ApiError> {
        self.post_command(id, "sync").await
    }

    /// Turn a persistent instance's trigger on.
    pub async fn activate_instance(&self, id: &str) -> Result<(), ApiError> {
        self.post_command(id, "activate").await
    }

    /// Turn a persistent instance's trigger off.
    pub async fn deactivate_instance(&self, id: &str) -> Result<(), ApiError> {
        self.post_command(id, "deactivate").await
    }

    /// Delete an instance.
    ///
    /// Sends `DELETE /workflow-instances/{id}`.
    pub async fn delete_instance(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&[id])?;
        let response = self.authorized(self.client.delete(url)).send().await?;

        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// `POST /workflow-instances/{id}/{command}` with an empty body.
    async fn post_command(&self, id: &str, command: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&[id, command])?;
        tracing::debug!(instance_id = %id, command, "Sending instance command");
        let response = self.authorized(self.client.post(url)).send().await?;

        Self::check_status(response).await
    }

    /// Resolve `segments` under the instances collection. Each segment is
    /// percent-encoded, so ids cannot escape their path position.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(INSTANCES_PATH)
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a classified [`ApiError`]
    /// carrying the body's message on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        decode_body(&bytes)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> ConsoleApi {
        ConsoleApi::new(&ClientConfig::new(base)).unwrap()
    }

    #[test]
    fn endpoint_appends_collection() {
        let api = api("http://localhost:8080/api/v1");
        assert_eq!(
            api.endpoint(&[]).unwrap().as_str(),
            "http://localhost:8080/api/v1/workflow-instances"
        );
    }

    #[test]
    fn endpoint_handles_trailing_slash() {
        let api = api("http://localhost:8080/api/v1/");
        assert_eq!(
            api.endpoint(&["wf-1", "start"]).unwrap().as_str(),
            "http://localhost:8080/api/v1/workflow-instances/wf-1/start"
        );
    }

    #[test]
    fn endpoint_encodes_ids() {
        let api = api("http://localhost:8080");
        assert_eq!(
            api.endpoint(&["../etc passwd"]).unwrap().as_str(),
            "http://localhost:8080/workflow-instances/..%2Fetc%20passwd"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            ConsoleApi::new(&ClientConfig::new("not a url")),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            ConsoleApi::new(&ClientConfig::new("mailto:ops@example.com")),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            ApiError::from_status(409, r#"{"error":"already running","code":"CONFLICT"}"#),
            ApiError::Rejected { status: 409, ref message } if message == "already running"
        ));
        assert!(matches!(
            ApiError::from_status(502, "bad gateway"),
            ApiError::Server { status: 502, ref message } if message == "bad gateway"
        ));
    }

    #[test]
    fn extract_message_fallbacks() {
        assert_eq!(extract_message(r#"{"message":"nope"}"#), "nope");
        assert_eq!(extract_message(r#"{"detail":"gone"}"#), "gone");
        assert_eq!(extract_message(r#"{"code":42}"#), r#"{"code":42}"#);
        assert_eq!(extract_message("  \n"), "<empty response body>");
    }

    #[test]
    fn body_accepts_both_shapes() {
        let wrapped: InstancePage = decode_body(br#"{"data":{"items":[],"total":3}}"#).unwrap();
        assert_eq!(wrapped.total, 3);

        let bare: InstancePage =
            decode_body(br#"{"items":[{"id":"a","name":"b"}],"total":1}"#).unwrap();
        assert_eq!(bare.items.len(), 1);
        assert_eq!(bare.items[0].id, "a");
    }

    #[test]
    fn null_items_decode_as_empty_page() {
        let page: InstancePage = decode_body(br#"{"data":{"items":null,"total":null}}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn record_with_null_fields_does_not_fail_the_page() {
        let page: InstancePage = decode_body(
            br#"{"items":[
                {"id":"a","name":"ok","status":"running"},
                {"id":"b","name":"odd","status":null,"is_active":null,"nodes":null,"trigger_type":"webhook"}
            ],"total":2}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1].node_count(), 0);
    }

    #[test]
    fn decode_error_names_the_field() {
        let err = decode_body::<InstancePage>(br#"{"data":{"items":[{"name":"no id"}]}}"#)
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(ref msg) if msg.contains("id")), "{err}");

        let err = decode_body::<InstancePage>(b"not json").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn error_display() {
        let err = ApiError::Rejected {
            status: 400,
            message: "name required".into(),
        };
        assert_eq!(err.to_string(), "Request rejected (400): name required");
    }
}
