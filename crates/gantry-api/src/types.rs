//! Wire types shared by the client, the CLI and the dashboard.
//!
//! - [`Server`] - a managed game server and its status
//! - [`ServerAction`] - per-server lifecycle action
//! - [`LogSource`] - console output channel
//! - [`LogEntry`] - one delivered log line
//! - [`StopAllResult`] - aggregate outcome of a stop-all call

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A managed server. `name` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Unique server name.
    pub name: String,
    /// Status as reported by the API (`running`, `stopped`, ...).
    #[serde(default)]
    pub status: String,
}

impl Server {
    /// Create a server record.
    #[must_use]
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
        }
    }

    /// Whether the API reports this server as running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }
}

/// Sort servers by name, ascending.
pub fn sort_servers(servers: &mut [Server]) {
    servers.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Per-server lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerAction {
    /// Start the server process.
    Start,
    /// Gracefully stop the server process.
    Stop,
    /// Stop then start.
    Restart,
    /// Terminate immediately.
    Kill,
}

impl ServerAction {
    /// Path segment used by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Kill => "kill",
        }
    }

    /// Past-tense verb for status messages.
    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Stop => "stopped",
            Self::Restart => "restarted",
            Self::Kill => "killed",
        }
    }
}

impl fmt::Display for ServerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Console output channel of a managed server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    /// All channels interleaved.
    #[default]
    Combined,
    /// Server application log.
    Server,
    /// JVM output.
    Java,
    /// Crash reports.
    Crash,
}

impl LogSource {
    /// Every source, in cycling order.
    pub const ALL: [Self; 4] = [Self::Combined, Self::Server, Self::Java, Self::Crash];

    /// Query value used by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Combined => "combined",
            Self::Server => "server",
            Self::Java => "java",
            Self::Crash => "crash",
        }
    }

    /// The next source in the cycle combined → server → java → crash → combined.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Combined => Self::Server,
            Self::Server => Self::Java,
            Self::Java => Self::Crash,
            Self::Crash => Self::Combined,
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown log source {s:?} (expected combined, server, java or crash)"))
    }
}

/// One line of console output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the line was produced, if the API said.
    pub timestamp: Option<DateTime<Utc>>,
    /// The line itself.
    pub message: String,
    /// Channel the line came from.
    pub source: LogSource,
}

#[derive(Deserialize)]
struct LogFrame {
    #[serde(default)]
    timestamp: Option<String>,
    message: String,
    #[serde(default)]
    source: Option<String>,
}

impl LogEntry {
    /// Build an entry without a timestamp.
    #[must_use]
    pub fn new(message: impl Into<String>, source: LogSource) -> Self {
        Self {
            timestamp: None,
            message: message.into(),
            source,
        }
    }

    /// Interpret one stream frame.
    ///
    /// Frames are JSON objects `{timestamp?, message, source?}`; anything else
    /// is taken as a raw line from `default_source`.
    #[must_use]
    pub fn parse_frame(text: &str, default_source: LogSource) -> Self {
        match serde_json::from_str::<LogFrame>(text) {
            Ok(frame) => Self {
                timestamp: frame
                    .timestamp
                    .as_deref()
                    .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                    .map(|ts| ts.with_timezone(&Utc)),
                message: frame.message,
                source: frame
                    .source
                    .as_deref()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default_source),
            },
            Err(_) => Self::new(text.trim_end_matches(['\r', '\n']), default_source),
        }
    }

    /// Single-line rendering used by the dashboard and `logs`.
    #[must_use]
    pub fn render(&self) -> String {
        match self.timestamp {
            Some(ts) => format!("{} [{}] {}", ts.format("%H:%M:%S"), self.source, self.message),
            None => format!("[{}] {}", self.source, self.message),
        }
    }
}

/// Per-server line of a stop-all result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAllItem {
    /// Server name.
    pub name: String,
    /// Outcome reported by the API.
    pub status: String,
    /// Failure detail, if this server could not be stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of a stop-all call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAllResult {
    /// Servers known to the API.
    pub total: u32,
    /// Servers that were running when the call started.
    pub running: u32,
    /// Servers stopped at the end of the call.
    pub stopped: u32,
    /// Servers that were not touched (already stopped).
    pub skipped: u32,
    /// Per-server outcomes, in API order.
    #[serde(default)]
    pub results: Vec<StopAllItem>,
}

impl StopAllResult {
    /// Per-server failures.
    pub fn failures(&self) -> impl Iterator<Item = &StopAllItem> {
        self.results.iter().filter(|item| item.error.is_some())
    }

    /// Whether any server failed to stop.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}
