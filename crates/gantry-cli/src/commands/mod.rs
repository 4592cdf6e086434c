//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`servers`] - Listing, per-server actions, stop-all, console, health
//! - [`stack`] - Whole-stack start/stop/restart
//! - [`logs`] - Console log following
//! - [`status`] - Stack overview
//! - [`config`] - Settings file inspection and editing
//! - [`auth`] - Credential refresh

pub mod auth;
pub mod config;
pub mod logs;
pub mod servers;
pub mod stack;
pub mod status;

pub use auth::{AuthCommand, RefreshCredential};
pub use config::ConfigCommand;
pub use logs::LogsCommand;
pub use servers::ServerCommand;
pub use stack::StackCommand;
pub use status::StatusCommand;
