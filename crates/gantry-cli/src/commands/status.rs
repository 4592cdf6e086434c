//! Stack status command implementation.
//!
//! Shows an overview of the stack including:
//! - Containers and their state
//! - API health
//! - Running/total game servers
//!
//! API failures degrade to warnings so the container view is always shown.

use std::io::Write;

use gantry_api::ManagementClient;
use tracing::debug;

use crate::error::CliError;
use crate::infra::Infrastructure;
use crate::output::{OutputFormat, ServerSummary, StackStatus};

/// Status command executor.
pub struct StatusCommand<'a, C, I> {
    client: &'a C,
    infra: &'a I,
}

impl<'a, C, I> StatusCommand<'a, C, I>
where
    C: ManagementClient,
    I: Infrastructure,
{
    /// Create a new status command.
    #[must_use]
    pub const fn new(client: &'a C, infra: &'a I) -> Self {
        Self { client, infra }
    }

    /// Execute the status command.
    pub async fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let status = self.fetch_status().await?;
        format.write(writer, &status)
    }

    /// Gather the stack overview.
    pub async fn fetch_status(&self) -> Result<StackStatus, CliError> {
        let containers = self.infra.status().await?;
        let mut warnings = Vec::new();

        let api_healthy = match self.client.health().await {
            Ok(healthy) => Some(healthy),
            Err(e) => {
                debug!(error = %e, "health probe failed");
                warnings.push(format!("API health unavailable: {e}"));
                None
            }
        };

        let servers = match self.client.list_servers().await {
            Ok(servers) => Some(ServerSummary::of(&servers)),
            Err(e) => {
                debug!(error = %e, "server listing failed");
                warnings.push(format!("server list unavailable: {e}"));
                None
            }
        };

        Ok(StackStatus {
            containers,
            api_healthy,
            servers,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ContainerInfo;
    use crate::infra::fake::FakeInfrastructure;
    use gantry_api::fake::FakeClient;
    use gantry_api::{ApiError, Server};

    fn container(name: &str) -> ContainerInfo {
        ContainerInfo {
            name: name.into(),
            service: "api".into(),
            state: "running".into(),
            status: "Up 5 minutes".into(),
        }
    }

    #[tokio::test]
    async fn full_status() {
        let api = FakeClient::new()
            .with_servers(vec![Server::new("a", "running"), Server::new("b", "stopped")])
            .with_credential(Some("key"));
        let infra = FakeInfrastructure::default().with_containers(vec![container("stack-api-1")]);
        let status = StatusCommand::new(&api, &infra).fetch_status().await.expect("status");

        assert_eq!(status.api_healthy, Some(true));
        let summary = status.servers.expect("summary");
        assert_eq!((summary.running, summary.total), (1, 2));
        assert!(status.warnings.is_empty());
    }

    #[tokio::test]
    async fn api_failure_is_a_warning() {
        let api = FakeClient::new().with_credential(Some("key"));
        api.push_failure(ApiError::Transport("connection refused".into()));
        api.push_failure(ApiError::Transport("connection refused".into()));
        let infra = FakeInfrastructure::default().with_containers(vec![container("stack-api-1")]);

        let mut buf = Vec::new();
        StatusCommand::new(&api, &infra)
            .execute(&mut buf, &OutputFormat::default())
            .await
            .expect("status still succeeds");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("stack-api-1"));
        assert!(text.contains("API:              unknown"));
        assert!(text.contains("⚠ server list unavailable"));
    }
}
