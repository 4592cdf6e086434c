//! Per-server commands: list, lifecycle actions, stop-all, console and health.

use std::io::Write;

use gantry_api::{ManagementClient, ServerAction};
use tracing::info;

use crate::error::CliError;
use crate::output::{HealthReport, Message, OutputFormat, ServerList};

/// Server command executor.
pub struct ServerCommand<'a, C> {
    client: &'a C,
}

impl<'a, C: ManagementClient> ServerCommand<'a, C> {
    /// Create a new server command.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// List servers sorted by name.
    pub async fn list<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let servers = self.client.list_servers().await?;
        format.write(writer, &ServerList::new(servers))
    }

    /// Run `action` on `name`.
    pub async fn action<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        name: &str,
        action: ServerAction,
    ) -> Result<(), CliError> {
        self.client.server_action(name, action).await?;
        info!(server = %name, action = %action, "server action completed");
        format.write(writer, &Message::success(format!("Server {name} {}", action.past_tense())))
    }

    /// Stop every running server within `timeout_secs`.
    ///
    /// Per-server failures are itemized in the output; the call itself
    /// still succeeds.
    pub async fn stop_all<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        timeout_secs: u64,
    ) -> Result<(), CliError> {
        let result = self.client.stop_all(timeout_secs).await?;
        format.write(writer, &result)
    }

    /// Send `words` joined by spaces to `name`'s console.
    pub async fn console<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        name: &str,
        words: &[String],
    ) -> Result<(), CliError> {
        let command = words.join(" ");
        if command.trim().is_empty() {
            return Err(CliError::InvalidArgument("console command cannot be empty".into()));
        }
        self.client.send_command(name, &command).await?;
        format.write(writer, &Message::success(format!("Sent to {name}: {command}")))
    }

    /// Probe the API's health endpoint.
    pub async fn health<W: Write>(&self, writer: &mut W, format: &OutputFormat, url: &str) -> Result<(), CliError> {
        let healthy = self.client.health().await?;
        format.write(
            writer,
            &HealthReport {
                url: url.to_string(),
                healthy,
            },
        )
    }
}
