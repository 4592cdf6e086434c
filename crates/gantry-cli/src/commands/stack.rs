//! Whole-stack start/stop/restart.

use std::io::Write;
use std::time::Duration;

use gantry_api::ManagementClient;
use serde::Serialize;

use crate::error::CliError;
use crate::infra::Infrastructure;
use crate::lifecycle::{Orchestrator, StartReport, StopReport};
use crate::output::{OutputFormat, TableDisplay};

/// Stack command executor.
pub struct StackCommand<'a, C, I> {
    orchestrator: Orchestrator<'a, C, I>,
}

/// Stop then start, reported together.
#[derive(Debug, Clone, Serialize)]
pub struct RestartReport {
    /// Stop stage.
    pub stop: StopReport,
    /// Start stage.
    pub start: StartReport,
}

impl TableDisplay for RestartReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        self.stop.write_table(writer)?;
        self.start.write_table(writer)
    }
}

impl<'a, C, I> StackCommand<'a, C, I>
where
    C: ManagementClient,
    I: Infrastructure,
{
    /// Create a new stack command.
    #[must_use]
    pub const fn new(orchestrator: Orchestrator<'a, C, I>) -> Self {
        Self { orchestrator }
    }

    /// Start the stack.
    pub async fn start<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        wait: bool,
        wait_timeout: Duration,
    ) -> Result<(), CliError> {
        let report = self.orchestrator.start(wait, wait_timeout).await?;
        format.write(writer, &report)
    }

    /// Stop the servers, then the stack.
    pub async fn stop<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        force: bool,
        timeout_secs: u64,
    ) -> Result<(), CliError> {
        let report = self.orchestrator.stop(force, timeout_secs).await?;
        format.write(writer, &report)
    }

    /// Gracefully stop, then start.
    pub async fn restart<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        wait: bool,
        wait_timeout: Duration,
        timeout_secs: u64,
    ) -> Result<(), CliError> {
        let (stop, start) = self.orchestrator.restart(wait, wait_timeout, timeout_secs).await?;
        format.write(writer, &RestartReport { stop, start })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use crate::infra::fake::FakeInfrastructure;
    use gantry_api::Server;
    use gantry_api::fake::FakeClient;

    #[tokio::test]
    async fn stop_prints_stop_all_then_stack() {
        let api = FakeClient::new()
            .with_servers(vec![Server::new("alpha", "running")])
            .with_credential(Some("key"));
        let infra = FakeInfrastructure::default();
        let mut buf = Vec::new();
        StackCommand::new(Orchestrator::new(&api, &infra))
            .stop(&mut buf, &OutputFormat::default(), false, 60)
            .await
            .expect("stop");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("Stopped:        1"));
        assert!(text.ends_with("✓ Stack stopped (container timeout 30s)\n"));
    }

    #[tokio::test]
    async fn restart_json_has_both_stages() {
        let api = FakeClient::new().with_credential(Some("key"));
        let infra = FakeInfrastructure::default();
        let mut buf = Vec::new();
        StackCommand::new(Orchestrator::new(&api, &infra))
            .restart(&mut buf, &OutputFormat::new(Format::Json), false, Duration::from_secs(1), 60)
            .await
            .expect("restart");
        let parsed: serde_json::Value = serde_json::from_slice(&buf).expect("valid json");
        assert_eq!(parsed["stop"]["servers"]["outcome"], "skipped");
        assert!(parsed["start"]["healthy"].is_null());
    }
}
