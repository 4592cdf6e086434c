//! gantry-tui - Gantry Terminal UI
//!
//! Standalone launcher for the dashboard that `gantry` opens when run
//! without a subcommand.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "gantry-tui")]
#[command(about = "Gantry dashboard - live server list, logs and console")]
#[command(version)]
struct Cli {
    /// Directory holding the stack's compose file and data.
    #[arg(long, env = "GANTRY_STACK_DIR", default_value = ".")]
    stack_dir: PathBuf,

    /// Settings file (defaults to `<stack-dir>/.env`).
    #[arg(long, env = "GANTRY_SETTINGS")]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging (to file, not terminal)
    if let Err(e) = gantry_tui::init_logging(&cli.stack_dir) {
        eprintln!("Warning: logging disabled: {e}");
    }

    let settings = cli.settings.unwrap_or_else(|| cli.stack_dir.join(".env"));
    gantry_tui::run(settings, cli.stack_dir).await
}
