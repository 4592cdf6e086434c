//! Gantry CLI binary entrypoint.
//!
//! This is the main entry point for the `gantry` command-line tool.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gantry_cli::cli::{Cli, Commands};
use gantry_cli::commands::ConfigCommand;
use gantry_cli::output::OutputFormat;
use gantry_cli::{CliError, Context, Terminal, execute};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The dashboard owns the terminal; its logs go to a file instead.
    if cli.is_dashboard() {
        return dashboard(&cli);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn dashboard(cli: &Cli) -> ExitCode {
    if let Err(e) = gantry_tui::init_logging(&cli.stack_dir) {
        eprintln!("Warning: dashboard logging disabled: {e}");
    }
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(gantry_tui::run(cli.settings_path(), cli.stack_dir.clone())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let format = OutputFormat::new(cli.format);
    let settings_path = cli.settings_path();
    let mut stdout = io::stdout().lock();

    let Some(command) = cli.command else {
        return Err(CliError::InvalidArgument("no command given".into()));
    };

    // Config commands never connect, so a broken settings file can still be fixed.
    if let Commands::Config { command } = &command {
        return ConfigCommand::new(&settings_path, &cli.stack_dir).execute(&mut stdout, &format, command);
    }

    let ctx = Context::connect(settings_path, cli.stack_dir)?;
    let mut stdin = io::stdin().lock();
    let mut stderr = io::stderr();
    let interrupt = async {
        // A failed handler install just means the stream runs until it ends.
        let _ = tokio::signal::ctrl_c().await;
    };

    execute(
        &ctx,
        command,
        &format,
        Terminal {
            input: &mut stdin,
            output: &mut stdout,
            prompt: &mut stderr,
        },
        interrupt,
    )
    .await
}
