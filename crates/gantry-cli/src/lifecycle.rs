//! Whole-stack start/stop/restart sequencing.
//!
//! A stack stop runs in two stages:
//!
//! 1. game servers are stopped through the management API (graceful
//!    stop-all with the shutdown budget, or a kill per server when forced);
//! 2. the containers are stopped with a short fixed timeout.
//!
//! Stage 2 is only issued after stage 1 has produced a result. A stage 1
//! failure is downgraded to a warning so the containers still go down.

use std::time::Duration;

use gantry_api::{ManagementClient, ServerAction, StopAllResult};
use serde::Serialize;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::CliError;
use crate::infra::Infrastructure;

/// Container stop timeout, independent of the server shutdown budget.
pub const INFRA_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between health probes while waiting for a started stack.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Result of one forced kill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KillOutcome {
    /// Server name.
    pub name: String,
    /// Failure detail, if the kill failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What happened to the game servers during a stack stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ServerStopOutcome {
    /// No servers were listed; nothing was sent.
    Skipped,
    /// One graceful stop-all call.
    StopAll(StopAllResult),
    /// One kill per server.
    Killed(Vec<KillOutcome>),
    /// Listing or stopping through the API failed.
    Unreachable(String),
}

/// Outcome of a stack stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopReport {
    /// Server stage.
    pub servers: ServerStopOutcome,
    /// Timeout the containers were given.
    pub infrastructure_timeout_secs: u64,
}

/// Outcome of a stack start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartReport {
    /// `None` when not waiting; `Some(false)` when the wait timed out.
    pub healthy: Option<bool>,
}

/// Sequences the stack around the management API.
#[derive(Debug)]
pub struct Orchestrator<'a, C, I> {
    client: &'a C,
    infra: &'a I,
    health_interval: Duration,
}

impl<'a, C, I> Orchestrator<'a, C, I>
where
    C: ManagementClient,
    I: Infrastructure,
{
    /// Create an orchestrator.
    pub const fn new(client: &'a C, infra: &'a I) -> Self {
        Self {
            client,
            infra,
            health_interval: HEALTH_POLL_INTERVAL,
        }
    }

    /// Override the health polling interval.
    #[must_use]
    pub const fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Start the containers, optionally waiting for the API to become healthy.
    ///
    /// A wait that times out is reported in the [`StartReport`], not as an error.
    pub async fn start(&self, wait: bool, wait_timeout: Duration) -> Result<StartReport, CliError> {
        info!("starting stack");
        self.infra.start().await?;
        if !wait {
            return Ok(StartReport { healthy: None });
        }
        let healthy = self.wait_healthy(wait_timeout).await;
        if !healthy {
            warn!(timeout_secs = wait_timeout.as_secs(), "API not healthy before wait timeout");
        }
        Ok(StartReport { healthy: Some(healthy) })
    }

    async fn wait_healthy(&self, wait_timeout: Duration) -> bool {
        let deadline = Instant::now() + wait_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.client.health()).await {
                Ok(Ok(true)) => return true,
                Ok(Ok(false)) => debug!("API not healthy yet"),
                Ok(Err(e)) => debug!(error = %e, "health probe failed"),
                Err(_) => {
                    debug!("health probe still pending at wait deadline");
                    return false;
                }
            }
            if Instant::now() + self.health_interval >= deadline {
                return false;
            }
            sleep(self.health_interval).await;
        }
    }

    /// Stop the game servers, then the containers.
    pub async fn stop(&self, force: bool, timeout_secs: u64) -> Result<StopReport, CliError> {
        let servers = match self.stop_servers(force, timeout_secs).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "server stage failed, stopping containers anyway");
                ServerStopOutcome::Unreachable(e.to_string())
            }
        };

        info!(timeout_secs = INFRA_STOP_TIMEOUT.as_secs(), "stopping containers");
        self.infra.stop(INFRA_STOP_TIMEOUT).await?;
        Ok(StopReport {
            servers,
            infrastructure_timeout_secs: INFRA_STOP_TIMEOUT.as_secs(),
        })
    }

    async fn stop_servers(&self, force: bool, timeout_secs: u64) -> Result<ServerStopOutcome, CliError> {
        let servers = self.client.list_servers().await?;
        if servers.is_empty() {
            debug!("no servers listed, skipping server stage");
            return Ok(ServerStopOutcome::Skipped);
        }

        if force {
            let mut outcomes = Vec::with_capacity(servers.len());
            for server in servers {
                let error = match self.client.server_action(&server.name, ServerAction::Kill).await {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(server = %server.name, error = %e, "kill failed");
                        Some(e.to_string())
                    }
                };
                outcomes.push(KillOutcome {
                    name: server.name,
                    error,
                });
            }
            return Ok(ServerStopOutcome::Killed(outcomes));
        }

        info!(servers = servers.len(), timeout_secs, "stopping servers");
        let result = self.client.stop_all(timeout_secs).await?;
        Ok(ServerStopOutcome::StopAll(result))
    }

    /// Graceful stop, then start.
    pub async fn restart(
        &self,
        wait: bool,
        wait_timeout: Duration,
        timeout_secs: u64,
    ) -> Result<(StopReport, StartReport), CliError> {
        let stopped = self.stop(false, timeout_secs).await?;
        let started = self.start(wait, wait_timeout).await?;
        Ok((stopped, started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::fake::{FakeInfrastructure, InfraCall};
    use gantry_api::fake::{Call, FakeClient};
    use gantry_api::{ApiError, Server};

    fn client(servers: Vec<Server>) -> FakeClient {
        FakeClient::new().with_servers(servers).with_credential(Some("key"))
    }

    #[tokio::test]
    async fn empty_server_list_skips_stop_all() {
        let api = client(Vec::new());
        let infra = FakeInfrastructure::default();
        let report = Orchestrator::new(&api, &infra).stop(false, 60).await.expect("stop");

        assert_eq!(report.servers, ServerStopOutcome::Skipped);
        assert_eq!(api.calls(), [Call::ListServers]);
        assert_eq!(infra.calls(), [InfraCall::Stop(INFRA_STOP_TIMEOUT)]);
    }

    #[tokio::test]
    async fn graceful_stop_uses_budget_then_fixed_container_timeout() {
        let api = client(vec![
            Server::new("alpha", "running"),
            Server::new("beta", "running"),
            Server::new("gamma", "stopped"),
        ]);
        let infra = FakeInfrastructure::default();
        let report = Orchestrator::new(&api, &infra).stop(false, 60).await.expect("stop");

        assert_eq!(api.calls(), [Call::ListServers, Call::StopAll(60)]);
        match report.servers {
            ServerStopOutcome::StopAll(result) => {
                assert_eq!(result.total, 3);
                assert_eq!(result.running, 2);
                assert_eq!(result.skipped, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(infra.calls(), [InfraCall::Stop(Duration::from_secs(30))]);
        assert_eq!(report.infrastructure_timeout_secs, 30);
    }

    #[tokio::test]
    async fn forced_stop_kills_each_and_tolerates_failures() {
        let api = client(vec![
            Server::new("alpha", "running"),
            Server::new("beta", "running"),
            Server::new("gamma", "running"),
        ]);
        api.fail_action_for("beta");
        let infra = FakeInfrastructure::default();
        let report = Orchestrator::new(&api, &infra).stop(true, 60).await.expect("stop");

        let ServerStopOutcome::Killed(outcomes) = report.servers else {
            panic!("expected kill outcomes");
        };
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|o| o.error.is_some())
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(failed, ["beta"]);
        assert!(api.calls().contains(&Call::Action("gamma".into(), ServerAction::Kill)));
        assert!(!api.calls().iter().any(|c| matches!(c, Call::StopAll(_))));
        assert_eq!(infra.calls().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_api_still_stops_containers() {
        let api = client(Vec::new());
        api.push_failure(ApiError::Transport("connection refused".into()));
        let infra = FakeInfrastructure::default();
        let report = Orchestrator::new(&api, &infra).stop(false, 60).await.expect("stop");

        assert!(matches!(report.servers, ServerStopOutcome::Unreachable(ref r) if r.contains("connection refused")));
        assert_eq!(infra.calls(), [InfraCall::Stop(INFRA_STOP_TIMEOUT)]);
    }

    #[tokio::test]
    async fn container_failure_is_an_error() {
        let api = client(Vec::new());
        let infra = FakeInfrastructure::default().failing_stop();
        let err = Orchestrator::new(&api, &infra).stop(false, 60).await.unwrap_err();
        assert!(matches!(err, CliError::Stack(_)));
    }

    #[tokio::test]
    async fn start_without_wait_skips_health_checks() {
        let api = client(Vec::new());
        let infra = FakeInfrastructure::default();
        let report = Orchestrator::new(&api, &infra)
            .start(false, Duration::from_secs(5))
            .await
            .expect("start");
        assert_eq!(report.healthy, None);
        assert!(api.calls().is_empty());
        assert_eq!(infra.calls(), [InfraCall::Start]);
    }

    #[tokio::test]
    async fn start_waits_until_healthy() {
        let api = client(Vec::new());
        api.script_health([false, false, true]);
        let infra = FakeInfrastructure::default();
        let report = Orchestrator::new(&api, &infra)
            .with_health_interval(Duration::from_millis(1))
            .start(true, Duration::from_secs(5))
            .await
            .expect("start");
        assert_eq!(report.healthy, Some(true));
        assert_eq!(api.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_is_a_warning_not_an_error() {
        let api = client(Vec::new());
        api.set_healthy(false);
        let infra = FakeInfrastructure::default();
        let report = Orchestrator::new(&api, &infra)
            .start(true, Duration::from_secs(10))
            .await
            .expect("start succeeds");
        assert_eq!(report.healthy, Some(false));
        // Probes at 0, 2, 4, 6 and 8 seconds.
        assert_eq!(api.call_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_health_check_is_cut_off_at_the_deadline() {
        let api = client(Vec::new());
        api.hang_health();
        let infra = FakeInfrastructure::default();
        let began = Instant::now();
        let report = Orchestrator::new(&api, &infra)
            .start(true, Duration::from_secs(10))
            .await
            .expect("start succeeds");
        assert_eq!(report.healthy, Some(false));
        assert_eq!(api.call_count(), 1);
        assert!(began.elapsed() <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn restart_stops_gracefully_then_starts() {
        let api = client(vec![Server::new("alpha", "running")]);
        let infra = FakeInfrastructure::default();
        let (stopped, started) = Orchestrator::new(&api, &infra)
            .restart(false, Duration::from_secs(5), 90)
            .await
            .expect("restart");
        assert!(matches!(stopped.servers, ServerStopOutcome::StopAll(_)));
        assert_eq!(started.healthy, None);
        assert_eq!(api.calls(), [Call::ListServers, Call::StopAll(90)]);
        assert_eq!(infra.calls(), [InfraCall::Stop(INFRA_STOP_TIMEOUT), InfraCall::Start]);
    }
}
