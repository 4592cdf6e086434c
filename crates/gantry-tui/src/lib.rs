//! Gantry Terminal UI Library
//!
//! Interactive dashboard over the management API: a server list, a live log
//! tail of the selected server, and a console command line.
//!
//! ```text
//!  key / tick ──┐
//!               ▼
//!        ┌─────────────┐  effects   ┌──────────┐
//!        │   update    │───────────►│ runtime  │── one task per effect
//!        └─────────────┘            └──────────┘
//!               ▲                        │
//!               └──────── message ───────┘
//! ```
//!
//! Only [`app::update`] changes the model; background tasks report back
//! through the same channel as terminal input.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod events;
pub mod runtime;
pub mod ui;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use gantry_api::{ManagementClient, Retrier};
use gantry_config::{DEFAULT_SHUTDOWN_TIMEOUT_SECS, Settings, effective_shutdown_timeout};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use app::{Message, Model, update};
use events::EventHandler;
use runtime::Runtime;

/// Interval between ticks when no input arrives.
pub const TICK_RATE: Duration = Duration::from_millis(100);

/// Log file written by the dashboard, relative to the stack directory.
pub const LOG_FILE: &str = "gantry-tui.log";

/// Send tracing output to [`LOG_FILE`] in `stack_dir`.
///
/// The terminal belongs to the dashboard, so nothing is logged to it.
/// `RUST_LOG` overrides the default `gantry=info` filter.
pub fn init_logging(stack_dir: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(stack_dir.join(LOG_FILE))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gantry=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(filter)
        .try_init()?;
    Ok(())
}

/// Run the dashboard until the operator quits.
pub async fn run(settings_path: PathBuf, stack_dir: PathBuf) -> anyhow::Result<()> {
    let settings = Settings::load(&settings_path, &stack_dir)?;
    let mut events = EventHandler::new(TICK_RATE);

    let notices = events.sender();
    let client = Retrier::connect(&settings, &stack_dir)?.with_notice(Arc::new(move |msg: &str| {
        // Dropped only when the loop has already exited.
        let _ = notices.send(Message::Notice(msg.to_string()));
    }));
    let runtime = Runtime::new(Arc::new(client), events.sender());
    let timeout = effective_shutdown_timeout(0, &settings.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT_SECS);
    info!(api = %settings.api_base_url(), stop_all_timeout = timeout, "dashboard starting");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut events, &runtime, timeout).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("dashboard stopped");
    result
}

async fn event_loop<C: ManagementClient + 'static>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    events: &mut EventHandler,
    runtime: &Runtime<C>,
    stop_all_timeout: u64,
) -> anyhow::Result<()> {
    let (mut model, effects) = Model::new(stop_all_timeout);
    runtime.run_all(effects);

    while model.running {
        terminal.draw(|frame| ui::draw(frame, &model))?;

        let Some(msg) = events.next().await else {
            break;
        };
        let (next, effects) = update(model, msg);
        model = next;
        runtime.run_all(effects);
    }
    Ok(())
}
