//! Management API client.
//!
//! [`ManagementClient`] is the seam every higher layer is written against;
//! [`HttpClient`] is the production implementation speaking HTTP/JSON for
//! one-shot calls and a WebSocket for console log subscriptions.
//!
//! # Example
//!
//! ```rust,no_run
//! use gantry_api::{Credential, HttpClient, ManagementClient};
//!
//! # async fn example() -> Result<(), gantry_api::ApiError> {
//! let client = HttpClient::new("http://127.0.0.1:8080", Some(Credential::new("key")))?;
//! for server in client.list_servers().await? {
//!     println!("{} {}", server.name, server.status);
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use gantry_config::Settings;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, trace};
use url::Url;

use crate::credential::Credential;
use crate::error::ApiError;
use crate::types::{LogEntry, LogSource, Server, ServerAction, StopAllResult};

/// Header carrying the API credential.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack added on top of the stop-all budget for the HTTP round trip.
const STOP_ALL_MARGIN: Duration = Duration::from_secs(30);

/// Live console output of one server.
pub type LogStream = BoxStream<'static, Result<LogEntry, ApiError>>;

/// Operations offered by the remote management API.
pub trait ManagementClient: Send + Sync {
    /// List managed servers.
    fn list_servers(&self) -> impl Future<Output = Result<Vec<Server>, ApiError>> + Send;

    /// Run a lifecycle action on one server.
    fn server_action(
        &self,
        name: &str,
        action: ServerAction,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Stop every running server within `timeout_secs`.
    fn stop_all(&self, timeout_secs: u64) -> impl Future<Output = Result<StopAllResult, ApiError>> + Send;

    /// Whether the API answers its health endpoint.
    fn health(&self) -> impl Future<Output = Result<bool, ApiError>> + Send;

    /// Send a console command to one server.
    fn send_command(&self, name: &str, command: &str) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Open a console log subscription.
    fn subscribe_logs(
        &self,
        name: &str,
        source: LogSource,
    ) -> impl Future<Output = Result<LogStream, ApiError>> + Send;
}

/// HTTP implementation of [`ManagementClient`].
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base: Url,
    credential: Option<Credential>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base", &self.base.as_str())
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ServerListBody {
    Wrapped {
        #[serde(default)]
        servers: Vec<Server>,
    },
    Bare(Vec<Server>),
}

impl HttpClient {
    /// Create a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not `http://` or `https://`, or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, credential: Option<Credential>) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidArgument(format!("invalid API URL {base_url}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidArgument(format!(
                "invalid API URL {base_url}, must start with http:// or https://"
            )));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base,
            credential,
        })
    }

    /// Create a client from the settings file's connection parameters.
    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        Self::new(
            &settings.api_base_url(),
            Credential::from_optional(settings.api_key.as_deref()),
        )
    }

    /// The credential this client sends.
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    fn key(&self) -> Result<&str, ApiError> {
        self.credential
            .as_ref()
            .map(Credential::as_str)
            .ok_or(ApiError::CredentialMissing)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidArgument(format!("API URL {} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post(&self, segments: &[&str], body: Option<serde_json::Value>) -> Result<Response, ApiError> {
        let key = self.key()?;
        let url = self.endpoint(segments)?;
        trace!(url = %url, "POST");
        let mut request = self.http.post(url).header(API_KEY_HEADER, key);
        if let Some(body) = body {
            request = request.json(&body);
        }
        check_status(request.send().await?).await
    }

    fn websocket_url(&self, name: &str, source: LogSource) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["api", "servers", name, "logs", "ws"])?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ApiError::InvalidArgument(format!("cannot derive WebSocket URL from {url}")))?;
        url.query_pairs_mut().append_pair("source", source.as_str());
        Ok(url)
    }
}

/// Map non-success statuses onto the error taxonomy.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(ApiError::CredentialInvalid {
            status: status.as_u16(),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["error", "message"] {
            if let Some(msg) = value.get(field).and_then(serde_json::Value::as_str) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.to_string()
    }
}

impl ManagementClient for HttpClient {
    async fn list_servers(&self) -> Result<Vec<Server>, ApiError> {
        let key = self.key()?;
        let url = self.endpoint(&["api", "servers"])?;
        let response = check_status(self.http.get(url).header(API_KEY_HEADER, key).send().await?).await?;
        let body: ServerListBody = response.json().await?;
        Ok(match body {
            ServerListBody::Wrapped { servers } | ServerListBody::Bare(servers) => servers,
        })
    }

    async fn server_action(&self, name: &str, action: ServerAction) -> Result<(), ApiError> {
        if name.is_empty() {
            return Err(ApiError::InvalidArgument("server name cannot be empty".into()));
        }
        debug!(server = %name, action = %action, "server action");
        self.post(&["api", "servers", name, action.as_str()], None).await?;
        Ok(())
    }

    async fn stop_all(&self, timeout_secs: u64) -> Result<StopAllResult, ApiError> {
        let key = self.key()?;
        let url = self.endpoint(&["api", "servers", "stop-all"])?;
        debug!(timeout_secs, "stop-all");
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, key)
            .timeout(Duration::from_secs(timeout_secs) + STOP_ALL_MARGIN)
            .json(&json!({ "timeout": timeout_secs }))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn health(&self) -> Result<bool, ApiError> {
        let url = self.endpoint(&["health"])?;
        let response = self.http.get(url).send().await?;
        Ok(response.status().is_success())
    }

    async fn send_command(&self, name: &str, command: &str) -> Result<(), ApiError> {
        if command.trim().is_empty() {
            return Err(ApiError::InvalidArgument("console command cannot be empty".into()));
        }
        self.post(
            &["api", "servers", name, "console"],
            Some(json!({ "command": command })),
        )
        .await?;
        Ok(())
    }

    async fn subscribe_logs(&self, name: &str, source: LogSource) -> Result<LogStream, ApiError> {
        let key = self.key()?;
        let url = self.websocket_url(name, source)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ApiError::InvalidArgument(e.to_string()))?;
        request.headers_mut().insert(
            API_KEY_HEADER,
            HeaderValue::from_str(key).map_err(|e| ApiError::InvalidArgument(e.to_string()))?,
        );

        debug!(server = %name, source = %source, "opening log subscription");
        let (ws, _response) = timeout(DEFAULT_CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| ApiError::Transport("log subscription timed out".into()))?
            .map_err(handshake_error)?;

        let stream = ws.filter_map(move |frame| async move {
            match frame {
                Ok(Message::Text(text)) => Some(Ok(LogEntry::parse_frame(text.as_str(), source))),
                Ok(_) => None,
                Err(e) => Some(Err(ApiError::Transport(e.to_string()))),
            }
        });
        Ok(stream.boxed())
    }
}

fn handshake_error(err: tungstenite::Error) -> ApiError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            if matches!(status.as_u16(), 401 | 403) {
                ApiError::CredentialInvalid {
                    status: status.as_u16(),
                }
            } else {
                ApiError::Status {
                    status: status.as_u16(),
                    message: "log subscription rejected".to_string(),
                }
            }
        }
        other => ApiError::Transport(other.to_string()),
    }
}
