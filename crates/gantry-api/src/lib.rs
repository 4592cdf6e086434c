//! # gantry-api
//!
//! Client side of the game-server management API.
//!
//! - [`client`]: the [`ManagementClient`] seam and its HTTP implementation
//! - [`credential`]: API keys and the authoritative key store
//! - [`retry`]: one-shot credential refresh around any client
//! - [`stream`]: generation-tagged, cancellable console log subscriptions
//! - [`types`]: wire types shared with the CLI and dashboard
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌────────────┐      HTTP / WS      ┌─────┐
//! │ CLI/TUI  │──►│ Retrier │──►│ HttpClient │◄───────────────────►│ API │
//! └──────────┘   └────┬────┘   └────────────┘                     └─────┘
//!                     │ on 401/403 or missing key
//!                     ▼
//!            ┌─────────────────┐
//!            │ CredentialStore │──► settings file (API_KEY)
//!            └─────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod credential;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod retry;
pub mod stream;
pub mod types;

pub use client::{API_KEY_HEADER, HttpClient, LogStream, ManagementClient};
pub use credential::{Credential, CredentialStore, SqliteCredentialStore};
pub use error::{ApiError, StoreError};
pub use retry::{ClientBuilder, NoticeSink, Retrier};
pub use stream::{LogCancel, LogStreamer, LogSubscription};
pub use types::{LogEntry, LogSource, Server, ServerAction, StopAllItem, StopAllResult, sort_servers};
