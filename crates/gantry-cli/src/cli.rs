//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gantry_api::LogSource;

/// Gantry - game-server stack control plane.
#[derive(Parser, Debug, Clone)]
#[command(name = "gantry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the stack's compose file and data.
    #[arg(long, global = true, env = "GANTRY_STACK_DIR", default_value = ".")]
    pub stack_dir: PathBuf,

    /// Settings file (defaults to `<stack-dir>/.env`).
    #[arg(long, global = true, env = "GANTRY_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute. Opens the dashboard when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Resolved settings file path.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(|| self.stack_dir.join(".env"))
    }

    /// Whether this invocation opens the interactive dashboard.
    #[must_use]
    pub fn is_dashboard(&self) -> bool {
        matches!(self.command, None | Some(Commands::Dashboard))
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Open the interactive dashboard.
    Dashboard,

    /// List managed servers.
    List,

    /// Start one server, or the whole stack when no server is given.
    Start(StartArgs),

    /// Stop one server, or the whole stack when no server is given.
    ///
    /// A stack stop gracefully stops every game server through the API
    /// before stopping the containers.
    Stop(StopArgs),

    /// Restart one server, or the whole stack when no server is given.
    Restart(RestartArgs),

    /// Terminate a server immediately.
    Kill {
        /// Server to kill.
        server: String,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Stop every running server.
    StopAll {
        /// Shutdown budget in seconds (0 uses SHUTDOWN_TIMEOUT, then 300).
        #[arg(allow_negative_numbers = true)]
        timeout: Option<i64>,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Follow a server's console output.
    Logs {
        /// Server to follow.
        server: String,

        /// Log source: combined, server, java or crash.
        #[arg(default_value = "combined")]
        source: LogSource,
    },

    /// Send a console command to a server.
    Console {
        /// Target server.
        server: String,

        /// Command text.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Check the management API's health endpoint.
    Health,

    /// Show containers, API health and a server summary.
    Status,

    /// Inspect or change the settings file.
    Config {
        /// Config subcommand to execute.
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Credential maintenance.
    Auth {
        /// Auth subcommand to execute.
        #[command(subcommand)]
        command: AuthCommands,
    },
}

/// Arguments for `start`.
#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Server to start; omit to start the stack.
    pub server: Option<String>,

    /// Wait for the API to report healthy (stack start only).
    #[arg(short, long)]
    pub wait: bool,

    /// Seconds to wait for health.
    #[arg(long, default_value_t = 120)]
    pub wait_timeout: u64,
}

/// Arguments for `stop`.
#[derive(Args, Debug, Clone)]
pub struct StopArgs {
    /// Server to stop; omit to stop the stack.
    pub server: Option<String>,

    /// Kill servers instead of stopping them gracefully.
    #[arg(long)]
    pub force: bool,

    /// Graceful shutdown budget in seconds (0 uses SHUTDOWN_TIMEOUT, then 300).
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub timeout: i64,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for `restart`.
#[derive(Args, Debug, Clone)]
pub struct RestartArgs {
    /// Server to restart; omit to restart the stack.
    pub server: Option<String>,

    /// Wait for the API to report healthy after starting.
    #[arg(short, long)]
    pub wait: bool,

    /// Seconds to wait for health.
    #[arg(long, default_value_t = 120)]
    pub wait_timeout: u64,

    /// Graceful shutdown budget in seconds (0 uses SHUTDOWN_TIMEOUT, then 300).
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub timeout: i64,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Print the effective settings (credential masked).
    Show,

    /// Set one key in the settings file.
    Set {
        /// Setting name, e.g. SHUTDOWN_TIMEOUT.
        key: String,
        /// New value.
        value: String,
    },
}

/// Auth subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommands {
    /// Replace the configured credential with the newest one in the key store.
    Refresh,
}
