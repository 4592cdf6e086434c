//! Scripted in-memory [`ManagementClient`] for tests.
//!
//! Clones share state, so a test can keep one handle for scripting and
//! assertions while the code under test owns another. Each clone carries its
//! own credential, mirroring how a rebuilt [`HttpClient`](crate::HttpClient)
//! carries a new key.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use futures::StreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use parking_lot::Mutex;

use crate::client::{LogStream, ManagementClient};
use crate::error::ApiError;
use crate::types::{LogEntry, LogSource, Server, ServerAction, StopAllItem, StopAllResult};

/// One recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `list_servers`
    ListServers,
    /// `server_action(name, action)`
    Action(String, ServerAction),
    /// `stop_all(timeout_secs)`
    StopAll(u64),
    /// `health`
    Health,
    /// `send_command(name, command)`
    Command(String, String),
    /// `subscribe_logs(name, source)`
    Subscribe(String, LogSource),
}

#[derive(Default)]
struct FakeState {
    servers: Vec<Server>,
    rejected: HashSet<String>,
    failures: VecDeque<ApiError>,
    failing_servers: HashSet<String>,
    stop_all_result: Option<StopAllResult>,
    healthy: bool,
    health_hangs: bool,
    health_script: VecDeque<bool>,
    log_feeds: VecDeque<futures::channel::mpsc::UnboundedReceiver<Result<LogEntry, ApiError>>>,
    calls: Vec<Call>,
    credentials_seen: Vec<Option<String>>,
}

/// In-memory management API.
#[derive(Clone)]
pub struct FakeClient {
    state: Arc<Mutex<FakeState>>,
    credential: Option<String>,
}

impl std::fmt::Debug for FakeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeClient")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl Default for FakeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClient {
    /// A healthy API with no servers and no credential.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                healthy: true,
                ..FakeState::default()
            })),
            credential: None,
        }
    }

    /// Replace the server list.
    #[must_use]
    pub fn with_servers(self, servers: Vec<Server>) -> Self {
        self.state.lock().servers = servers;
        self
    }

    /// A handle sharing this fake's state but sending `credential`.
    #[must_use]
    pub fn with_credential(&self, credential: Option<&str>) -> Self {
        Self {
            state: Arc::clone(&self.state),
            credential: credential.map(str::to_string),
        }
    }

    /// Credential this handle sends.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Answer requests carrying `key` with HTTP 401.
    pub fn reject_credential(&self, key: &str) {
        self.state.lock().rejected.insert(key.to_string());
    }

    /// Fail the next authenticated call with `err`.
    pub fn push_failure(&self, err: ApiError) {
        self.state.lock().failures.push_back(err);
    }

    /// Fail every action against `name` with HTTP 500.
    pub fn fail_action_for(&self, name: &str) {
        self.state.lock().failing_servers.insert(name.to_string());
    }

    /// Answer stop-all with `result` instead of stopping the server list.
    pub fn set_stop_all_result(&self, result: StopAllResult) {
        self.state.lock().stop_all_result = Some(result);
    }

    /// Default health answer.
    pub fn set_healthy(&self, healthy: bool) {
        self.state.lock().healthy = healthy;
    }

    /// Make every later health probe wait forever.
    pub fn hang_health(&self) {
        self.state.lock().health_hangs = true;
    }

    /// Health answers consumed one per call before falling back to the default.
    pub fn script_health(&self, answers: impl IntoIterator<Item = bool>) {
        self.state.lock().health_script.extend(answers);
    }

    /// Queue a log feed; the next subscription reads from it.
    ///
    /// Subscriptions opened with no feed queued stay open and silent.
    pub fn push_log_feed(&self) -> UnboundedSender<Result<LogEntry, ApiError>> {
        let (tx, rx) = unbounded();
        self.state.lock().log_feeds.push_back(rx);
        tx
    }

    /// Current server list.
    #[must_use]
    pub fn servers(&self) -> Vec<Server> {
        self.state.lock().servers.clone()
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Credential sent with each authenticated call.
    #[must_use]
    pub fn credentials_seen(&self) -> Vec<Option<String>> {
        self.state.lock().credentials_seen.clone()
    }

    /// Record `call` and check the credential and failure queue.
    fn enter(&self, call: Call) -> Result<parking_lot::MutexGuard<'_, FakeState>, ApiError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        state.credentials_seen.push(self.credential.clone());
        let Some(key) = self.credential.as_deref() else {
            return Err(ApiError::CredentialMissing);
        };
        if state.rejected.contains(key) {
            return Err(ApiError::CredentialInvalid { status: 401 });
        }
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        Ok(state)
    }
}

fn not_found(name: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        message: format!("server {name} not found"),
    }
}

impl ManagementClient for FakeClient {
    async fn list_servers(&self) -> Result<Vec<Server>, ApiError> {
        let state = self.enter(Call::ListServers)?;
        Ok(state.servers.clone())
    }

    async fn server_action(&self, name: &str, action: ServerAction) -> Result<(), ApiError> {
        let mut state = self.enter(Call::Action(name.to_string(), action))?;
        if state.failing_servers.contains(name) {
            return Err(ApiError::Status {
                status: 500,
                message: format!("failed to {action} {name}"),
            });
        }
        let server = state
            .servers
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| not_found(name))?;
        server.status = match action {
            ServerAction::Start | ServerAction::Restart => "running",
            ServerAction::Stop | ServerAction::Kill => "stopped",
        }
        .to_string();
        Ok(())
    }

    async fn stop_all(&self, timeout_secs: u64) -> Result<StopAllResult, ApiError> {
        let mut state = self.enter(Call::StopAll(timeout_secs))?;
        if let Some(result) = state.stop_all_result.clone() {
            return Ok(result);
        }
        let mut result = StopAllResult {
            total: state.servers.len() as u32,
            ..StopAllResult::default()
        };
        for server in &mut state.servers {
            if server.is_running() {
                result.running += 1;
                result.stopped += 1;
                server.status = "stopped".to_string();
                result.results.push(StopAllItem {
                    name: server.name.clone(),
                    status: "stopped".to_string(),
                    error: None,
                });
            } else {
                result.skipped += 1;
                result.results.push(StopAllItem {
                    name: server.name.clone(),
                    status: "skipped".to_string(),
                    error: None,
                });
            }
        }
        Ok(result)
    }

    async fn health(&self) -> Result<bool, ApiError> {
        let answer = {
            let mut state = self.state.lock();
            state.calls.push(Call::Health);
            if let Some(err) = state.failures.pop_front() {
                return Err(err);
            }
            let healthy = state.healthy;
            (!state.health_hangs).then(|| state.health_script.pop_front().unwrap_or(healthy))
        };
        match answer {
            Some(healthy) => Ok(healthy),
            None => std::future::pending::<Result<bool, ApiError>>().await,
        }
    }

    async fn send_command(&self, name: &str, command: &str) -> Result<(), ApiError> {
        let state = self.enter(Call::Command(name.to_string(), command.to_string()))?;
        if !state.servers.iter().any(|s| s.name == name) {
            return Err(not_found(name));
        }
        Ok(())
    }

    async fn subscribe_logs(&self, name: &str, source: LogSource) -> Result<LogStream, ApiError> {
        let mut state = self.enter(Call::Subscribe(name.to_string(), source))?;
        Ok(match state.log_feeds.pop_front() {
            Some(feed) => feed.boxed(),
            None => futures::stream::pending::<Result<LogEntry, ApiError>>().boxed(),
        })
    }
}
