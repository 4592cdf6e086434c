//! Container stack driver.
//!
//! [`Infrastructure`] is what the lifecycle orchestrator starts and stops
//! around the game servers. [`ComposeStack`] drives it with `docker compose`.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::CliError;

/// One container of the stack as reported by the container tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Container name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Compose service name.
    #[serde(rename = "Service", default)]
    pub service: String,
    /// Coarse state (`running`, `exited`, ...).
    #[serde(rename = "State", default)]
    pub state: String,
    /// Human-readable status (`Up 3 minutes`).
    #[serde(rename = "Status", default)]
    pub status: String,
}

/// The containers hosting the management API and game servers.
pub trait Infrastructure: Send + Sync {
    /// Bring every container up.
    fn start(&self) -> impl Future<Output = Result<(), CliError>> + Send;

    /// Stop every container, allowing `timeout` for each to exit.
    fn stop(&self, timeout: Duration) -> impl Future<Output = Result<(), CliError>> + Send;

    /// Current containers.
    fn status(&self) -> impl Future<Output = Result<Vec<ContainerInfo>, CliError>> + Send;
}

/// `docker compose` driver.
#[derive(Debug, Clone)]
pub struct ComposeStack {
    compose_file: PathBuf,
    project_dir: PathBuf,
}

impl ComposeStack {
    /// Drive the stack described by `compose_file`, run from `project_dir`.
    #[must_use]
    pub fn new(compose_file: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            compose_file: compose_file.into(),
            project_dir: project_dir.into(),
        }
    }

    async fn compose(&self, args: &[&str]) -> Result<String, CliError> {
        debug!(file = %self.compose_file.display(), ?args, "docker compose");
        let output = Command::new("docker")
            .arg("compose")
            .arg("-f")
            .arg(&self.compose_file)
            .args(args)
            .current_dir(&self.project_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CliError::Stack(format!("failed to run docker compose: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CliError::Stack(format!(
                "docker compose {} failed ({}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Infrastructure for ComposeStack {
    async fn start(&self) -> Result<(), CliError> {
        self.compose(&["up", "-d"]).await.map(drop)
    }

    async fn stop(&self, timeout: Duration) -> Result<(), CliError> {
        let secs = timeout.as_secs().to_string();
        self.compose(&["stop", "--timeout", &secs]).await.map(drop)
    }

    async fn status(&self) -> Result<Vec<ContainerInfo>, CliError> {
        let stdout = self.compose(&["ps", "--format", "json"]).await?;
        parse_ps_output(&stdout)
    }
}

/// Parse `docker compose ps --format json`.
///
/// Older releases print one JSON array; newer ones print one object per line.
pub fn parse_ps_output(stdout: &str) -> Result<Vec<ContainerInfo>, CliError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let decode = |e: serde_json::Error| CliError::Stack(format!("unexpected docker compose ps output: {e}"));
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(decode);
    }
    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(decode))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ndjson() {
        let out = concat!(
            r#"{"Name":"stack-api-1","Service":"api","State":"running","Status":"Up 2 minutes"}"#,
            "\n",
            r#"{"Name":"stack-web-1","Service":"web","State":"exited","Status":"Exited (0)"}"#,
            "\n"
        );
        let containers = parse_ps_output(out).expect("parse");
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].service, "api");
        assert_eq!(containers[1].state, "exited");
    }

    #[test]
    fn parses_array() {
        let out = r#"[{"Name":"stack-api-1","Service":"api","State":"running","Status":"Up"}]"#;
        let containers = parse_ps_output(out).expect("parse");
        assert_eq!(containers[0].name, "stack-api-1");
    }

    #[test]
    fn empty_output_is_no_containers() {
        assert!(parse_ps_output("  \n").expect("parse").is_empty());
    }

    #[test]
    fn garbage_is_a_stack_error() {
        assert!(matches!(parse_ps_output("NAME IMAGE"), Err(CliError::Stack(_))));
    }
}
