//! # gantry-cli
//!
//! Gantry command-line interface.
//!
//! Provides commands for:
//! - Listing servers and running per-server actions
//! - Starting, stopping and restarting the whole container stack
//! - Following console logs and sending console commands
//! - Health and status diagnostics
//! - Settings and credential maintenance
//!
//! # Architecture
//!
//! Remote commands go through a [`gantry_api::Retrier`], which refreshes a
//! rejected credential from the key store and retries once. Stack commands
//! additionally drive `docker compose` through [`infra::ComposeStack`].
//!
//! ```text
//! ┌────────────┐   HTTP / WebSocket   ┌─────────────────┐
//! │ gantry-cli │◄────────────────────►│ management API  │
//! └─────┬──────┘                      └─────────────────┘
//!       │ docker compose
//!       ▼
//! ┌────────────┐
//! │ containers │
//! └────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod confirm;
pub mod context;
pub mod error;
pub mod infra;
pub mod lifecycle;
pub mod output;

pub use cli::{AuthCommands, Cli, Commands, ConfigCommands, Format};
pub use context::{Context, LiveClient, Terminal, execute};
pub use error::CliError;
pub use output::OutputFormat;
