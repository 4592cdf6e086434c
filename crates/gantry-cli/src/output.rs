//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use gantry_api::{LogEntry, Server, StopAllResult, sort_servers};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;
use crate::infra::ContainerInfo;
use crate::lifecycle::{ServerStopOutcome, StartReport, StopReport};

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write one record of a stream: a compact JSON line, or the table form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_line<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => value.write_table(writer)?,
        }
        writer.flush()?;
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Managed servers, sorted by name.
#[derive(Debug, Clone, Serialize)]
pub struct ServerList {
    /// Servers in name order.
    pub servers: Vec<Server>,
}

impl ServerList {
    /// Build a listing; the servers are sorted by name.
    #[must_use]
    pub fn new(mut servers: Vec<Server>) -> Self {
        sort_servers(&mut servers);
        Self { servers }
    }
}

impl TableDisplay for ServerList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.servers.is_empty() {
            writeln!(writer, "No servers found")?;
            return Ok(());
        }

        writeln!(writer, "{:<32}  {:<12}", "NAME", "STATUS")?;
        writeln!(writer, "{}", "─".repeat(46))?;
        for server in &self.servers {
            writeln!(writer, "{:<32}  {:<12}", truncate(&server.name, 32), server.status)?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} server(s)", self.servers.len())?;
        Ok(())
    }
}

impl TableDisplay for StopAllResult {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Stop-all")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "  Total:          {}", self.total)?;
        writeln!(writer, "  Running:        {}", self.running)?;
        writeln!(writer, "  Stopped:        {}", self.stopped)?;
        writeln!(writer, "  Skipped:        {}", self.skipped)?;
        if self.has_failures() {
            writeln!(writer)?;
            writeln!(writer, "Failures")?;
            for item in self.failures() {
                writeln!(
                    writer,
                    "  ✗ {}: {}",
                    item.name,
                    item.error.as_deref().unwrap_or("unknown error")
                )?;
            }
        }
        Ok(())
    }
}

impl TableDisplay for StopReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        match &self.servers {
            ServerStopOutcome::Skipped => writeln!(writer, "No servers to stop")?,
            ServerStopOutcome::StopAll(result) => {
                result.write_table(writer)?;
                writeln!(writer)?;
            }
            ServerStopOutcome::Killed(outcomes) => {
                for outcome in outcomes {
                    match &outcome.error {
                        None => writeln!(writer, "✓ Killed {}", outcome.name)?,
                        Some(err) => writeln!(writer, "✗ {}: {err}", outcome.name)?,
                    }
                }
            }
            ServerStopOutcome::Unreachable(reason) => {
                writeln!(writer, "⚠ Could not stop servers through the API: {reason}")?;
            }
        }
        writeln!(
            writer,
            "✓ Stack stopped (container timeout {}s)",
            self.infrastructure_timeout_secs
        )?;
        Ok(())
    }
}

impl TableDisplay for StartReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "✓ Stack started")?;
        match self.healthy {
            None => {}
            Some(true) => writeln!(writer, "✓ API is healthy")?,
            Some(false) => writeln!(writer, "⚠ API did not report healthy before the wait timeout")?,
        }
        Ok(())
    }
}

impl TableDisplay for LogEntry {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.render())?;
        Ok(())
    }
}

/// API health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// API base URL.
    pub url: String,
    /// Whether the health endpoint answered with success.
    pub healthy: bool,
}

impl TableDisplay for HealthReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.healthy {
            writeln!(writer, "✓ API at {} is healthy", self.url)?;
        } else {
            writeln!(writer, "✗ API at {} is unhealthy", self.url)?;
        }
        Ok(())
    }
}

/// Running/total server counts.
#[derive(Debug, Clone, Serialize)]
pub struct ServerSummary {
    /// Servers known to the API.
    pub total: usize,
    /// Servers currently running.
    pub running: usize,
}

impl ServerSummary {
    /// Count `servers`.
    #[must_use]
    pub fn of(servers: &[Server]) -> Self {
        Self {
            total: servers.len(),
            running: servers.iter().filter(|s| s.is_running()).count(),
        }
    }
}

/// Combined stack overview.
#[derive(Debug, Clone, Serialize)]
pub struct StackStatus {
    /// Containers of the stack.
    pub containers: Vec<ContainerInfo>,
    /// API health, if it could be determined.
    pub api_healthy: Option<bool>,
    /// Server counts, if the API could be queried.
    pub servers: Option<ServerSummary>,
    /// Problems that did not prevent the report.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl TableDisplay for StackStatus {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Stack Status")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer)?;
        writeln!(writer, "Containers")?;
        if self.containers.is_empty() {
            writeln!(writer, "  None running")?;
        }
        for container in &self.containers {
            writeln!(
                writer,
                "  {:<24}  {:<10}  {}",
                truncate(&container.name, 24),
                container.state,
                container.status
            )?;
        }
        writeln!(writer)?;
        let api = match self.api_healthy {
            Some(true) => "healthy",
            Some(false) => "unhealthy",
            None => "unknown",
        };
        writeln!(writer, "API:              {api}")?;
        if let Some(summary) = &self.servers {
            writeln!(writer, "Servers:          {}/{} running", summary.running, summary.total)?;
        }
        for warning in &self.warnings {
            writeln!(writer, "⚠ {warning}")?;
        }
        Ok(())
    }
}

/// One displayed setting.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigEntry {
    /// Setting name.
    pub key: String,
    /// Effective value.
    pub value: String,
}

/// Effective settings.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    /// Settings file location.
    pub path: String,
    /// Effective values, credential masked.
    pub entries: Vec<ConfigEntry>,
}

impl TableDisplay for ConfigView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Settings: {}", self.path)?;
        writeln!(writer, "{}", "─".repeat(46))?;
        for entry in &self.entries {
            writeln!(writer, "{:<18}{}", entry.key, entry.value)?;
        }
        Ok(())
    }
}

/// A simple message output.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Message text.
    pub message: String,
    /// Whether this is a success message.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub success: bool,
}

impl Message {
    /// Create a success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    /// Create an informational message.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }
}

impl TableDisplay for Message {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.success {
            writeln!(writer, "✓ {}", self.message)?;
        } else {
            writeln!(writer, "{}", self.message)?;
        }
        Ok(())
    }
}

/// Truncate a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}
