//! Dashboard state and the update function.
//!
//! The dashboard follows a Model/Message/Effect loop: every input (a key,
//! a tick, the one-shot result of a background task) arrives as a
//! [`Message`], and [`update`] is the only code that changes the [`Model`].
//! Follow-up work is returned as [`Effect`]s for the runtime to perform.
//!
//! Log streaming re-arms one entry at a time: each delivered entry comes
//! back with its subscription, and `update` hands the subscription back in
//! an [`Effect::ReadLog`] only after the entry has been appended.

use std::collections::VecDeque;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use gantry_api::{
    ApiError, LogCancel, LogEntry, LogSource, LogSubscription, Server, ServerAction, StopAllResult, sort_servers,
};
use tracing::debug;

/// Log lines kept for the log pane.
pub const LOG_CAPACITY: usize = 500;

/// Input mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Keys navigate and trigger actions.
    #[default]
    Normal,
    /// Keys edit the console command line.
    Command,
}

/// Footer message. A new one always replaces the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Outcome of a successful action.
    Status(String),
    /// Outcome of a failed action.
    Error(String),
}

/// Bounded FIFO of rendered log lines.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

impl LogBuffer {
    /// An empty buffer holding at most `capacity` lines.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `line`, evicting the oldest line when full.
    pub fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Number of lines held.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no lines are held.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// All lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.lines.iter()
    }

    /// The newest `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &String> {
        self.lines.iter().skip(self.lines.len().saturating_sub(n))
    }
}

/// Dashboard state.
#[derive(Debug)]
pub struct Model {
    /// False once the operator quits.
    pub running: bool,
    /// Input mode.
    pub mode: Mode,
    /// Snapshot of the last server listing, sorted by name.
    pub servers: Vec<Server>,
    /// Index into `servers`; meaningless while `servers` is empty.
    pub selected: usize,
    /// Log tail of the selected server.
    pub logs: LogBuffer,
    /// Whether the log pane follows the selected server.
    pub show_logs: bool,
    /// Channel the log pane follows.
    pub log_source: LogSource,
    /// Handle of the current subscription, if one is open.
    pub log_cancel: Option<LogCancel>,
    /// Tag of the current subscription; results carrying another tag are stale.
    pub log_generation: u64,
    /// Footer message.
    pub notice: Option<Notice>,
    /// Console command being edited.
    pub command_input: String,
    /// Budget passed to stop-all.
    pub stop_all_timeout: u64,
    /// Set by an operator reload; the next listing may resubscribe a stream
    /// that has ended.
    pub reload_requested: bool,
}

impl Model {
    /// Initial state plus the effects that populate it.
    pub fn new(stop_all_timeout: u64) -> (Self, Vec<Effect>) {
        let model = Self {
            running: true,
            mode: Mode::Normal,
            servers: Vec::new(),
            selected: 0,
            logs: LogBuffer::default(),
            show_logs: true,
            log_source: LogSource::Combined,
            log_cancel: None,
            log_generation: 0,
            notice: None,
            command_input: String::new(),
            stop_all_timeout,
            reload_requested: false,
        };
        (model, vec![Effect::FetchServers])
    }

    /// The selected server, if any.
    pub fn selected_server(&self) -> Option<&Server> {
        self.servers.get(self.selected)
    }

    fn status(&mut self, msg: impl Into<String>) {
        self.notice = Some(Notice::Status(msg.into()));
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.notice = Some(Notice::Error(msg.into()));
    }

    /// Cancel the current subscription, if any, and invalidate its results.
    fn close_logs(&mut self) {
        if let Some(cancel) = self.log_cancel.take() {
            cancel.cancel();
        }
        self.log_generation += 1;
    }

    /// Replace the subscription with one for the current selection and source.
    ///
    /// The old handle is always cancelled before the new one is created.
    fn reopen_logs(&mut self, effects: &mut Vec<Effect>) {
        self.close_logs();
        self.logs.clear();
        if !self.show_logs {
            return;
        }
        let Some(server) = self.selected_server() else {
            return;
        };
        let server = server.name.clone();
        let cancel = LogCancel::new();
        self.log_cancel = Some(cancel.clone());
        debug!(server = %server, source = %self.log_source, generation = self.log_generation, "following logs");
        effects.push(Effect::OpenLogs {
            server,
            source: self.log_source,
            generation: self.log_generation,
            cancel,
        });
    }
}

/// Inputs to [`update`].
pub enum Message {
    /// Key press.
    Key(KeyEvent),
    /// Terminal resized; the next draw picks up the new size.
    Resize,
    /// Periodic wake-up.
    Tick,
    /// Operator-facing notice from the API layer.
    Notice(String),
    /// Result of [`Effect::FetchServers`].
    ServersLoaded(Result<Vec<Server>, ApiError>),
    /// Result of [`Effect::Action`].
    ActionFinished {
        /// Target server.
        server: String,
        /// Action that ran.
        action: ServerAction,
        /// Outcome.
        result: Result<(), ApiError>,
    },
    /// Result of [`Effect::StopAll`].
    StopAllFinished(Result<StopAllResult, ApiError>),
    /// Result of [`Effect::SendCommand`].
    CommandSent {
        /// Target server.
        server: String,
        /// Command text.
        command: String,
        /// Outcome.
        result: Result<(), ApiError>,
    },
    /// Result of [`Effect::OpenLogs`].
    LogOpened {
        /// Tag the subscription was opened under.
        generation: u64,
        /// The subscription, or why it could not be opened.
        result: Result<LogSubscription, ApiError>,
    },
    /// Result of [`Effect::ReadLog`].
    LogReceived {
        /// Tag of the subscription that was read.
        generation: u64,
        /// The entry, an error, or `None` when the stream ended.
        entry: Option<Result<LogEntry, ApiError>>,
        /// The subscription, handed back for the next read.
        subscription: LogSubscription,
    },
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Resize => f.write_str("Resize"),
            Self::Tick => f.write_str("Tick"),
            Self::Notice(msg) => f.debug_tuple("Notice").field(msg).finish(),
            Self::ServersLoaded(result) => f.debug_tuple("ServersLoaded").field(&result.is_ok()).finish(),
            Self::ActionFinished { server, action, .. } => f
                .debug_struct("ActionFinished")
                .field("server", server)
                .field("action", action)
                .finish_non_exhaustive(),
            Self::StopAllFinished(result) => f.debug_tuple("StopAllFinished").field(&result.is_ok()).finish(),
            Self::CommandSent { server, .. } => {
                f.debug_struct("CommandSent").field("server", server).finish_non_exhaustive()
            }
            Self::LogOpened { generation, .. } => {
                f.debug_struct("LogOpened").field("generation", generation).finish_non_exhaustive()
            }
            Self::LogReceived { generation, .. } => {
                f.debug_struct("LogReceived").field("generation", generation).finish_non_exhaustive()
            }
        }
    }
}

/// Work for the runtime. Each effect produces exactly one [`Message`].
#[derive(Debug)]
pub enum Effect {
    /// List servers.
    FetchServers,
    /// Run `action` on `server`.
    Action {
        /// Target server.
        server: String,
        /// Action to run.
        action: ServerAction,
    },
    /// Stop every running server.
    StopAll {
        /// Shutdown budget.
        timeout_secs: u64,
    },
    /// Send a console command.
    SendCommand {
        /// Target server.
        server: String,
        /// Command text.
        command: String,
    },
    /// Open a log subscription governed by `cancel`.
    OpenLogs {
        /// Server to follow.
        server: String,
        /// Channel to follow.
        source: LogSource,
        /// Tag for the resulting messages.
        generation: u64,
        /// Handle held by the model.
        cancel: LogCancel,
    },
    /// Wait for the next entry of `subscription`.
    ReadLog {
        /// Tag for the resulting message.
        generation: u64,
        /// Subscription to read.
        subscription: LogSubscription,
    },
}

/// Apply `msg` to `model`.
pub fn update(mut model: Model, msg: Message) -> (Model, Vec<Effect>) {
    let mut effects = Vec::new();
    match msg {
        Message::Key(key) => match model.mode {
            Mode::Normal => normal_key(&mut model, key, &mut effects),
            Mode::Command => command_key(&mut model, key, &mut effects),
        },
        Message::Resize | Message::Tick => {}
        Message::Notice(msg) => model.status(msg),
        Message::ServersLoaded(Ok(mut servers)) => {
            sort_servers(&mut servers);
            let previous = model.selected_server().map(|s| s.name.clone());
            model.selected = previous
                .as_deref()
                .and_then(|name| servers.iter().position(|s| s.name == name))
                .unwrap_or_else(|| model.selected.min(servers.len().saturating_sub(1)));
            model.servers = servers;
            let current = model.selected_server().map(|s| s.name.clone());
            let resume = std::mem::take(&mut model.reload_requested) && model.log_cancel.is_none();
            if current != previous || resume {
                model.reopen_logs(&mut effects);
            }
        }
        Message::ServersLoaded(Err(e)) => {
            model.reload_requested = false;
            model.error(format!("Could not list servers: {e}"));
        }
        Message::ActionFinished { server, action, result } => match result {
            Ok(()) => {
                model.status(format!("✓ Server {server} {}", action.past_tense()));
                effects.push(Effect::FetchServers);
            }
            Err(e) => model.error(format!("{action} {server} failed: {e}")),
        },
        Message::StopAllFinished(Ok(result)) => {
            let failed: Vec<&str> = result.failures().map(|item| item.name.as_str()).collect();
            if failed.is_empty() {
                model.status(format!("✓ Stopped {} of {} servers", result.stopped, result.total));
            } else {
                model.error(format!(
                    "Stopped {} of {} servers; failed: {}",
                    result.stopped,
                    result.total,
                    failed.join(", ")
                ));
            }
            effects.push(Effect::FetchServers);
        }
        Message::StopAllFinished(Err(e)) => model.error(format!("Stop-all failed: {e}")),
        Message::CommandSent { server, command, result } => match result {
            Ok(()) => model.status(format!("Sent to {server}: {command}")),
            Err(e) => model.error(format!("Command to {server} failed: {e}")),
        },
        Message::LogOpened { generation, result } => {
            if generation != model.log_generation {
                debug!(generation, current = model.log_generation, "dropping stale log subscription");
                return (model, effects);
            }
            match result {
                Ok(subscription) => effects.push(Effect::ReadLog { generation, subscription }),
                Err(e) => {
                    model.log_cancel = None;
                    model.error(format!("Logs unavailable: {e}"));
                }
            }
        }
        Message::LogReceived {
            generation,
            entry,
            subscription,
        } => {
            if generation != model.log_generation {
                debug!(generation, current = model.log_generation, "discarding entry from stale subscription");
                return (model, effects);
            }
            match entry {
                Some(Ok(entry)) => {
                    model.logs.push(entry.render());
                    effects.push(Effect::ReadLog { generation, subscription });
                }
                // Not resumed automatically; reselecting or reloading opens a new one.
                Some(Err(e)) => {
                    model.log_cancel = None;
                    model.error(format!("Log stream ended: {e}"));
                }
                None => {
                    model.log_cancel = None;
                    model.status("Log stream closed");
                }
            }
        }
    }
    (model, effects)
}

fn normal_key(model: &mut Model, key: KeyEvent, effects: &mut Vec<Effect>) {
    match key.code {
        KeyCode::Char('q') => quit(model),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => quit(model),
        KeyCode::Up | KeyCode::Char('k') => {
            if model.selected > 0 {
                model.selected -= 1;
                model.reopen_logs(effects);
            }
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if model.selected + 1 < model.servers.len() {
                model.selected += 1;
                model.reopen_logs(effects);
            }
        }
        KeyCode::Char('r') => {
            model.status("Refreshing servers…");
            model.reload_requested = true;
            effects.push(Effect::FetchServers);
        }
        KeyCode::Char('l') => {
            model.show_logs = !model.show_logs;
            model.reopen_logs(effects);
        }
        KeyCode::Char('o') => {
            model.log_source = model.log_source.next();
            model.status(format!("Log source: {}", model.log_source));
            model.reopen_logs(effects);
        }
        KeyCode::Char('c') => {
            if model.selected_server().is_some() {
                model.mode = Mode::Command;
                model.command_input.clear();
            } else {
                model.error("No server selected");
            }
        }
        KeyCode::Char('s') => action(model, ServerAction::Start, effects),
        KeyCode::Char('x') => action(model, ServerAction::Stop, effects),
        KeyCode::Char('e') => action(model, ServerAction::Restart, effects),
        KeyCode::Char('K') => action(model, ServerAction::Kill, effects),
        KeyCode::Char('a') => {
            model.status(format!("Stopping all servers ({}s budget)…", model.stop_all_timeout));
            effects.push(Effect::StopAll {
                timeout_secs: model.stop_all_timeout,
            });
        }
        _ => {}
    }
}

fn command_key(model: &mut Model, key: KeyEvent, effects: &mut Vec<Effect>) {
    match key.code {
        KeyCode::Esc => {
            model.mode = Mode::Normal;
            model.command_input.clear();
        }
        KeyCode::Enter => {
            model.mode = Mode::Normal;
            let command = std::mem::take(&mut model.command_input).trim().to_string();
            if command.is_empty() {
                return;
            }
            match model.selected_server() {
                Some(server) => effects.push(Effect::SendCommand {
                    server: server.name.clone(),
                    command,
                }),
                None => model.error("No server selected"),
            }
        }
        KeyCode::Backspace => {
            model.command_input.pop();
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => quit(model),
        KeyCode::Char(ch) => model.command_input.push(ch),
        _ => {}
    }
}

fn action(model: &mut Model, action: ServerAction, effects: &mut Vec<Effect>) {
    let Some(server) = model.selected_server() else {
        model.error("No server selected");
        return;
    };
    let server = server.name.clone();
    model.status(format!("{action} {server}…"));
    effects.push(Effect::Action { server, action });
}

fn quit(model: &mut Model) {
    model.close_logs();
    model.running = false;
}
