//! Settings file inspection and editing.

use std::io::Write;
use std::path::Path;

use gantry_api::Credential;
use gantry_config::{
    DEFAULT_SHUTDOWN_TIMEOUT_SECS, KEY_API_HOST, KEY_API_KEY, KEY_API_KEY_DB, KEY_API_PORT, KEY_COMPOSE_FILE,
    KEY_SHUTDOWN_TIMEOUT, Settings, update_setting,
};
use tracing::info;

use crate::cli::ConfigCommands;
use crate::error::CliError;
use crate::output::{ConfigEntry, ConfigView, Message, OutputFormat};

/// Handler for `config` subcommands.
pub struct ConfigCommand<'a> {
    settings_path: &'a Path,
    stack_dir: &'a Path,
}

impl<'a> ConfigCommand<'a> {
    /// Creates a new config command handler.
    #[must_use]
    pub const fn new(settings_path: &'a Path, stack_dir: &'a Path) -> Self {
        Self {
            settings_path,
            stack_dir,
        }
    }

    /// Executes a config subcommand.
    pub fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &ConfigCommands,
    ) -> Result<(), CliError> {
        match command {
            ConfigCommands::Show => self.show(writer, format),
            ConfigCommands::Set { key, value } => self.set(writer, format, key, value),
        }
    }

    fn show<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let settings = Settings::load(self.settings_path, self.stack_dir)?;
        format.write(writer, &view(&settings))
    }

    fn set<W: Write>(&self, writer: &mut W, format: &OutputFormat, key: &str, value: &str) -> Result<(), CliError> {
        validate(key, value)?;
        update_setting(self.settings_path, key, value)?;
        info!(key = %key, path = %self.settings_path.display(), "setting updated");
        format.write(
            writer,
            &Message::success(format!("Set {key} in {}", self.settings_path.display())),
        )
    }
}

fn validate(key: &str, value: &str) -> Result<(), CliError> {
    match key {
        KEY_API_PORT if !matches!(value.parse::<u16>(), Ok(port) if port > 0) => Err(CliError::InvalidArgument(
            format!("{KEY_API_PORT} must be a port number, got {value:?}"),
        )),
        KEY_SHUTDOWN_TIMEOUT if !value.is_empty() && value.parse::<u64>().is_err() => Err(CliError::InvalidArgument(
            format!("{KEY_SHUTDOWN_TIMEOUT} must be a number of seconds, got {value:?}"),
        )),
        _ => Ok(()),
    }
}

fn view(settings: &Settings) -> ConfigView {
    let key = Credential::from_optional(settings.api_key.as_deref())
        .map_or_else(|| "(not set)".to_string(), |c| c.masked());
    let timeout = if settings.shutdown_timeout.trim().is_empty() {
        format!("{DEFAULT_SHUTDOWN_TIMEOUT_SECS} (default)")
    } else {
        settings.shutdown_timeout_secs().to_string()
    };
    let entry = |key: &str, value: String| ConfigEntry {
        key: key.to_string(),
        value,
    };
    ConfigView {
        path: settings.path.display().to_string(),
        entries: vec![
            entry(KEY_API_HOST, settings.api_host.clone()),
            entry(KEY_API_PORT, settings.api_port.to_string()),
            entry(KEY_API_KEY, key),
            entry(KEY_SHUTDOWN_TIMEOUT, timeout),
            entry(KEY_API_KEY_DB, settings.key_db.display().to_string()),
            entry(KEY_COMPOSE_FILE, settings.compose_file.display().to_string()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;

    #[test]
    fn show_masks_the_credential() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        std::fs::write(&path, "API_KEY=gantry_0123456789abcdef\nAPI_PORT=9000\n").expect("seed");

        let mut buf = Vec::new();
        ConfigCommand::new(&path, dir.path())
            .execute(&mut buf, &OutputFormat::default(), &ConfigCommands::Show)
            .expect("show");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("gant********"));
        assert!(!text.contains("0123456789abcdef"));
        assert!(text.contains("9000"));
        assert!(text.contains("300 (default)"));
    }

    #[test]
    fn set_preserves_other_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        std::fs::write(&path, "# stack settings\nAPI_HOST=10.0.0.5\n").expect("seed");

        let command = ConfigCommands::Set {
            key: "SHUTDOWN_TIMEOUT".into(),
            value: "120".into(),
        };
        ConfigCommand::new(&path, dir.path())
            .execute(&mut Vec::<u8>::new(), &OutputFormat::new(Format::Json), &command)
            .expect("set");
        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.starts_with("# stack settings\nAPI_HOST=10.0.0.5\n"));
        assert!(text.contains("SHUTDOWN_TIMEOUT=120"));
    }

    #[test]
    fn set_rejects_bad_port() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        let command = ConfigCommands::Set {
            key: "API_PORT".into(),
            value: "http".into(),
        };
        let err = ConfigCommand::new(&path, dir.path())
            .execute(&mut Vec::<u8>::new(), &OutputFormat::default(), &command)
            .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
        assert!(!path.exists());
    }

    #[test]
    fn set_rejects_invalid_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".env");
        let command = ConfigCommands::Set {
            key: "NOT A KEY".into(),
            value: "x".into(),
        };
        let err = ConfigCommand::new(&path, dir.path())
            .execute(&mut Vec::<u8>::new(), &OutputFormat::default(), &command)
            .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
