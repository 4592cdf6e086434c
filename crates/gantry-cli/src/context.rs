//! Command dispatch.
//!
//! A [`Context`] bundles what remote commands need: the (retrying) API
//! client, the container stack and the loaded settings. [`execute`] routes
//! one parsed command through it, asking for confirmation first where the
//! command is destructive.

use std::future::Future;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gantry_api::{HttpClient, ManagementClient, Retrier, ServerAction, SqliteCredentialStore};
use gantry_config::{DEFAULT_SHUTDOWN_TIMEOUT_SECS, Settings, effective_shutdown_timeout};

use crate::cli::Commands;
use crate::commands::{
    AuthCommand, ConfigCommand, LogsCommand, RefreshCredential, ServerCommand, StackCommand, StatusCommand,
};
use crate::confirm::confirm_unless;
use crate::error::CliError;
use crate::infra::{ComposeStack, Infrastructure};
use crate::lifecycle::Orchestrator;
use crate::output::OutputFormat;

/// Production client: HTTP refreshed from the SQLite key store.
pub type LiveClient = Retrier<HttpClient, SqliteCredentialStore>;

/// Everything a remote command runs against.
#[derive(Debug)]
pub struct Context<C, I> {
    /// API client.
    pub client: Arc<C>,
    /// Container stack.
    pub infra: I,
    /// Settings loaded at startup.
    pub settings: Settings,
    /// Stack directory.
    pub stack_dir: PathBuf,
}

impl Context<LiveClient, ComposeStack> {
    /// Load settings and wire the production client and stack driver.
    ///
    /// Credential refresh notices go to stderr.
    pub fn connect(settings_path: PathBuf, stack_dir: PathBuf) -> Result<Self, CliError> {
        let settings = Settings::load(&settings_path, &stack_dir)?;
        let client = Retrier::connect(&settings, &stack_dir)?
            .with_notice(Arc::new(|msg: &str| eprintln!("{msg}")));
        let infra = ComposeStack::new(&settings.compose_file, &stack_dir);
        Ok(Self {
            client: Arc::new(client),
            infra,
            settings,
            stack_dir,
        })
    }
}

impl<C, I> Context<C, I>
where
    C: ManagementClient + RefreshCredential + 'static,
    I: Infrastructure,
{
    fn shutdown_timeout(&self, override_secs: i64) -> u64 {
        effective_shutdown_timeout(override_secs, &self.settings.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT_SECS)
    }

    fn orchestrator(&self) -> Orchestrator<'_, C, I> {
        Orchestrator::new(&*self.client, &self.infra)
    }
}

/// Operator-facing streams for one command.
pub struct Terminal<'a, R, W, P> {
    /// Confirmation answers.
    pub input: &'a mut R,
    /// Command output (tables or JSON).
    pub output: &'a mut W,
    /// Confirmation prompts, kept off `output`.
    pub prompt: &'a mut P,
}

/// Run one command.
///
/// `interrupt` resolves when the operator asks a following command (`logs`)
/// to stop.
pub async fn execute<C, I, R, W, P, F>(
    ctx: &Context<C, I>,
    command: Commands,
    format: &OutputFormat,
    term: Terminal<'_, R, W, P>,
    interrupt: F,
) -> Result<(), CliError>
where
    C: ManagementClient + RefreshCredential + 'static,
    I: Infrastructure,
    R: BufRead,
    W: Write,
    P: Write,
    F: Future<Output = ()> + Send + 'static,
{
    let Terminal { input, output, prompt } = term;
    let servers = ServerCommand::new(&*ctx.client);

    match command {
        Commands::Dashboard => Err(CliError::InvalidArgument(
            "the dashboard needs an interactive terminal".into(),
        )),
        Commands::List => servers.list(output, format).await,
        Commands::Start(args) => match args.server {
            Some(name) => servers.action(output, format, &name, ServerAction::Start).await,
            None => {
                StackCommand::new(ctx.orchestrator())
                    .start(output, format, args.wait, Duration::from_secs(args.wait_timeout))
                    .await
            }
        },
        Commands::Stop(args) => match args.server {
            Some(name) => servers.action(output, format, &name, ServerAction::Stop).await,
            None => {
                let verb = if args.force { "Kill" } else { "Stop" };
                confirm_unless(
                    args.yes,
                    &format!("{verb} all game servers and stop the stack?"),
                    input,
                    prompt,
                )?;
                StackCommand::new(ctx.orchestrator())
                    .stop(output, format, args.force, ctx.shutdown_timeout(args.timeout))
                    .await
            }
        },
        Commands::Restart(args) => match args.server {
            Some(name) => servers.action(output, format, &name, ServerAction::Restart).await,
            None => {
                confirm_unless(args.yes, "Restart the whole stack?", input, prompt)?;
                StackCommand::new(ctx.orchestrator())
                    .restart(
                        output,
                        format,
                        args.wait,
                        Duration::from_secs(args.wait_timeout),
                        ctx.shutdown_timeout(args.timeout),
                    )
                    .await
            }
        },
        Commands::Kill { server, yes } => {
            confirm_unless(yes, &format!("Kill server {server}?"), input, prompt)?;
            servers.action(output, format, &server, ServerAction::Kill).await
        }
        Commands::StopAll { timeout, yes } => {
            confirm_unless(yes, "Stop all running servers?", input, prompt)?;
            servers
                .stop_all(output, format, ctx.shutdown_timeout(timeout.unwrap_or(0)))
                .await
        }
        Commands::Logs { server, source } => {
            LogsCommand::new(Arc::clone(&ctx.client))
                .follow(output, format, &server, source, interrupt)
                .await
        }
        Commands::Console { server, command } => servers.console(output, format, &server, &command).await,
        Commands::Health => {
            servers
                .health(output, format, &ctx.settings.api_base_url())
                .await
        }
        Commands::Status => {
            StatusCommand::new(&*ctx.client, &ctx.infra)
                .execute(output, format)
                .await
        }
        Commands::Config { command } => {
            ConfigCommand::new(&ctx.settings.path, &ctx.stack_dir).execute(output, format, &command)
        }
        Commands::Auth { command } => AuthCommand::new(&*ctx.client).execute(output, format, &command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::infra::fake::{FakeInfrastructure, InfraCall};
    use crate::lifecycle::INFRA_STOP_TIMEOUT;
    use clap::Parser;
    use gantry_api::fake::{Call, FakeClient};
    use gantry_api::{Credential, CredentialStore, Server, StoreError};

    struct OneKey(&'static str);

    impl CredentialStore for OneKey {
        fn newest_active(&self) -> Result<Option<Credential>, StoreError> {
            Ok(Some(Credential::new(self.0)))
        }

        fn describe(&self) -> String {
            "test keys".into()
        }
    }

    type TestContext = Context<Retrier<FakeClient, OneKey>, FakeInfrastructure>;

    fn context(fake: &FakeClient, settings_text: &str) -> (tempfile::TempDir, TestContext) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        std::fs::write(&path, settings_text).expect("seed settings");
        let settings = Settings::load(&path, dir.path()).expect("settings");
        let template = fake.clone();
        let client = Retrier::new(
            fake.with_credential(settings.api_key.as_deref()),
            &path,
            dir.path(),
            OneKey("fresh"),
            Box::new(move |s: &Settings| Ok(template.with_credential(s.api_key.as_deref()))),
        );
        let ctx = Context {
            client: Arc::new(client),
            infra: FakeInfrastructure::default(),
            settings,
            stack_dir: dir.path().to_path_buf(),
        };
        (dir, ctx)
    }

    struct Run {
        result: Result<(), CliError>,
        output: String,
        prompt: String,
    }

    async fn run(ctx: &TestContext, args: &[&str], answer: &str) -> Run {
        let cli = Cli::parse_from(std::iter::once("gantry").chain(args.iter().copied()));
        let command = cli.command.clone().expect("a subcommand");
        let (mut output, mut prompt) = (Vec::new(), Vec::new());
        let mut input = answer.as_bytes();
        let result = execute(
            ctx,
            command,
            &OutputFormat::new(cli.format),
            Terminal {
                input: &mut input,
                output: &mut output,
                prompt: &mut prompt,
            },
            std::future::pending::<()>(),
        )
        .await;
        Run {
            result,
            output: String::from_utf8(output).expect("utf8"),
            prompt: String::from_utf8(prompt).expect("utf8"),
        }
    }

    fn three_servers() -> FakeClient {
        FakeClient::new().with_servers(vec![
            Server::new("alpha", "running"),
            Server::new("beta", "running"),
            Server::new("gamma", "stopped"),
        ])
    }

    #[tokio::test]
    async fn declined_stack_stop_touches_nothing() {
        let fake = three_servers();
        let (_dir, ctx) = context(&fake, "API_KEY=key\n");
        let run = run(&ctx, &["stop"], "n\n").await;

        assert!(matches!(run.result, Err(CliError::Cancelled)));
        assert!(run.prompt.contains("Stop all game servers and stop the stack? [y/N]"));
        assert!(fake.calls().is_empty());
        assert!(ctx.infra.calls().is_empty());
    }

    #[tokio::test]
    async fn stack_stop_uses_configured_budget() {
        let fake = three_servers();
        let (_dir, ctx) = context(&fake, "API_KEY=key\nSHUTDOWN_TIMEOUT=120\n");
        let run = run(&ctx, &["stop"], "y\n").await;

        run.result.expect("stop");
        assert_eq!(fake.calls(), [Call::ListServers, Call::StopAll(120)]);
        assert_eq!(ctx.infra.calls(), [InfraCall::Stop(INFRA_STOP_TIMEOUT)]);
    }

    #[tokio::test]
    async fn explicit_timeout_wins() {
        let fake = three_servers();
        let (_dir, ctx) = context(&fake, "API_KEY=key\nSHUTDOWN_TIMEOUT=120\n");
        let run = run(&ctx, &["stop-all", "45", "-y"], "").await;

        run.result.expect("stop-all");
        assert!(run.prompt.is_empty());
        assert_eq!(fake.calls(), [Call::StopAll(45)]);
        assert!(run.output.contains("Total:          3"));
    }

    #[tokio::test]
    async fn stop_all_falls_back_to_default_budget() {
        let fake = three_servers();
        let (_dir, ctx) = context(&fake, "API_KEY=key\n");
        run(&ctx, &["stop-all", "-y"], "").await.result.expect("stop-all");
        assert_eq!(fake.calls(), [Call::StopAll(300)]);
    }

    #[tokio::test]
    async fn kill_needs_confirmation() {
        let fake = three_servers();
        let (_dir, ctx) = context(&fake, "API_KEY=key\n");
        let declined = run(&ctx, &["kill", "alpha"], "\n").await;
        assert!(matches!(declined.result, Err(CliError::Cancelled)));
        assert!(fake.calls().is_empty());

        let confirmed = run(&ctx, &["kill", "alpha"], "yes\n").await;
        confirmed.result.expect("kill");
        assert_eq!(fake.calls(), [Call::Action("alpha".into(), ServerAction::Kill)]);
    }

    #[tokio::test]
    async fn server_start_does_not_touch_stack() {
        let fake = three_servers();
        let (_dir, ctx) = context(&fake, "API_KEY=key\n");
        run(&ctx, &["start", "gamma"], "").await.result.expect("start");
        assert_eq!(fake.calls(), [Call::Action("gamma".into(), ServerAction::Start)]);
        assert!(ctx.infra.calls().is_empty());
    }

    #[tokio::test]
    async fn stale_credential_is_refreshed_transparently() {
        let fake = three_servers();
        fake.reject_credential("stale");
        let (dir, ctx) = context(&fake, "API_HOST=10.0.0.5\nAPI_KEY=stale\n");
        let run = run(&ctx, &["list"], "").await;

        run.result.expect("list after refresh");
        assert!(run.output.contains("alpha"));
        let text = std::fs::read_to_string(dir.path().join(".env")).expect("settings");
        assert!(text.contains("API_KEY=fresh"));
        assert!(text.contains("API_HOST=10.0.0.5"));
    }

    #[tokio::test]
    async fn missing_credential_is_refreshed_too() {
        let fake = three_servers();
        let (_dir, ctx) = context(&fake, "");
        run(&ctx, &["list"], "").await.result.expect("list after refresh");
        assert_eq!(fake.credentials_seen(), [None, Some("fresh".to_string())]);
    }

    #[tokio::test]
    async fn auth_refresh_rewrites_settings() {
        let fake = three_servers();
        let (dir, ctx) = context(&fake, "API_KEY=old\n");
        let run = run(&ctx, &["auth", "refresh"], "").await;
        run.result.expect("refresh");
        assert!(run.output.contains("API credential refreshed"));
        let text = std::fs::read_to_string(dir.path().join(".env")).expect("settings");
        assert!(text.contains("API_KEY=fresh"));
    }

    #[tokio::test]
    async fn json_list_is_machine_readable() {
        let fake = three_servers();
        let (_dir, ctx) = context(&fake, "API_KEY=key\n");
        let run = run(&ctx, &["--format", "json", "list"], "").await;
        run.result.expect("list");
        let parsed: serde_json::Value = serde_json::from_str(&run.output).expect("valid json");
        assert_eq!(parsed["servers"].as_array().map(Vec::len), Some(3));
    }
}
