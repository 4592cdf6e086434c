//! Credential-refresh retry wrapper.
//!
//! [`Retrier`] runs an operation against the current client. When the
//! operation fails with a credential error it fetches the newest non-revoked
//! key from the [`CredentialStore`], writes it into the settings file,
//! rebuilds the client and runs the operation exactly once more. There is no
//! loop and no backoff: a second failure is returned as-is.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gantry_config::{KEY_API_KEY, Settings, update_setting};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::client::{HttpClient, LogStream, ManagementClient};
use crate::credential::{Credential, CredentialStore, SqliteCredentialStore};
use crate::error::ApiError;
use crate::types::{LogSource, Server, ServerAction, StopAllResult};

/// Builds a client from freshly loaded settings.
pub type ClientBuilder<C> = Box<dyn Fn(&Settings) -> Result<C, ApiError> + Send + Sync>;

/// Receives operator-facing notices (e.g. "credential refreshed").
pub type NoticeSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Wraps a client with the one-shot credential refresh protocol.
pub struct Retrier<C, S> {
    client: RwLock<C>,
    settings_path: PathBuf,
    stack_dir: PathBuf,
    store: S,
    build: ClientBuilder<C>,
    notice: Option<NoticeSink>,
}

impl<C, S> std::fmt::Debug for Retrier<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("settings_path", &self.settings_path)
            .finish_non_exhaustive()
    }
}

impl<C, S> Retrier<C, S>
where
    C: ManagementClient + Clone,
    S: CredentialStore,
{
    /// Wrap `client`.
    ///
    /// `build` is used to recreate the client after the settings file has
    /// been rewritten with a refreshed credential.
    pub fn new(
        client: C,
        settings_path: impl Into<PathBuf>,
        stack_dir: impl Into<PathBuf>,
        store: S,
        build: ClientBuilder<C>,
    ) -> Self {
        Self {
            client: RwLock::new(client),
            settings_path: settings_path.into(),
            stack_dir: stack_dir.into(),
            store,
            build,
            notice: None,
        }
    }

    /// Route refresh notices to `sink`.
    #[must_use]
    pub fn with_notice(mut self, sink: NoticeSink) -> Self {
        self.notice = Some(sink);
        self
    }

    /// Settings file the refreshed credential is written to.
    #[must_use]
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// A snapshot of the current client.
    pub fn client(&self) -> C {
        self.client.read().clone()
    }

    /// Run `op`, refreshing the credential and retrying once on a credential error.
    pub async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, ApiError>
    where
        F: Fn(C) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, ApiError>> + Send,
        T: Send,
    {
        let client = self.client();
        match op(client).await {
            Err(err) if err.is_credential() => {
                warn!(error = %err, "credential rejected, refreshing from store");
                let (refreshed, _) = self.refresh(err)?;
                op(refreshed).await
            }
            other => other,
        }
    }

    /// Force a refresh regardless of the current credential's state.
    pub fn refresh_now(&self) -> Result<Credential, ApiError> {
        self.refresh(ApiError::CredentialMissing)
            .map(|(_, credential)| credential)
    }

    /// Replace the credential with the store's newest one and rebuild the client.
    ///
    /// `original` is the error that prompted the refresh; it is attached to
    /// any refresh failure other than an empty store.
    fn refresh(&self, original: ApiError) -> Result<(C, Credential), ApiError> {
        let wrap = |reason: String, original: ApiError| ApiError::CredentialRefresh {
            original: Box::new(original),
            reason,
        };

        let credential = match self.store.newest_active() {
            Ok(Some(credential)) => credential,
            Ok(None) => return Err(ApiError::NoActiveCredential),
            Err(e) => return Err(wrap(e.to_string(), original)),
        };
        let settings = match update_setting(&self.settings_path, KEY_API_KEY, credential.as_str())
            .and_then(|()| Settings::load(&self.settings_path, &self.stack_dir))
        {
            Ok(settings) => settings,
            Err(e) => return Err(wrap(e.to_string(), original)),
        };
        let client = match (self.build)(&settings) {
            Ok(client) => client,
            Err(e) => return Err(wrap(e.to_string(), original)),
        };
        *self.client.write() = client.clone();

        info!(
            store = %self.store.describe(),
            credential = %credential.masked(),
            "API credential refreshed"
        );
        if let Some(notice) = &self.notice {
            notice(&format!(
                "API credential refreshed from {} and saved to {}",
                self.store.describe(),
                self.settings_path.display()
            ));
        }
        Ok((client, credential))
    }
}

impl Retrier<HttpClient, SqliteCredentialStore> {
    /// Production wiring: an HTTP client refreshed from the SQLite key store
    /// named by `settings`.
    pub fn connect(settings: &Settings, stack_dir: impl Into<PathBuf>) -> Result<Self, ApiError> {
        let client = HttpClient::from_settings(settings)?;
        let store = SqliteCredentialStore::new(&settings.key_db);
        Ok(Self::new(
            client,
            &settings.path,
            stack_dir,
            store,
            Box::new(HttpClient::from_settings),
        ))
    }
}

impl<C, S> ManagementClient for Retrier<C, S>
where
    C: ManagementClient + Clone,
    S: CredentialStore,
{
    async fn list_servers(&self) -> Result<Vec<Server>, ApiError> {
        self.with_retry(|c| async move { c.list_servers().await }).await
    }

    async fn server_action(&self, name: &str, action: ServerAction) -> Result<(), ApiError> {
        self.with_retry(|c| async move { c.server_action(name, action).await })
            .await
    }

    async fn stop_all(&self, timeout_secs: u64) -> Result<StopAllResult, ApiError> {
        self.with_retry(|c| async move { c.stop_all(timeout_secs).await }).await
    }

    async fn health(&self) -> Result<bool, ApiError> {
        self.with_retry(|c| async move { c.health().await }).await
    }

    async fn send_command(&self, name: &str, command: &str) -> Result<(), ApiError> {
        self.with_retry(|c| async move { c.send_command(name, command).await })
            .await
    }

    async fn subscribe_logs(&self, name: &str, source: LogSource) -> Result<LogStream, ApiError> {
        self.with_retry(|c| async move { c.subscribe_logs(name, source).await })
            .await
    }
}
