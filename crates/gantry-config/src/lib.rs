//! Settings for the gantry control plane.
//!
//! The stack is described by a single `KEY=VALUE` settings file (usually the
//! stack's `.env`). This crate parses it, exposes a typed [`Settings`] view and
//! rewrites individual keys atomically. All helpers take explicit paths and
//! hold no process-wide state.

#![forbid(unsafe_code)]

pub mod error;
pub mod file;

use std::path::{Path, PathBuf};

pub use error::{ConfigError, Result};
pub use file::{SettingsFile, read_settings, update_setting, write_settings};

/// Host of the management API.
pub const KEY_API_HOST: &str = "API_HOST";
/// Port of the management API.
pub const KEY_API_PORT: &str = "API_PORT";
/// Current API credential.
pub const KEY_API_KEY: &str = "API_KEY";
/// Server-level shutdown budget in seconds.
pub const KEY_SHUTDOWN_TIMEOUT: &str = "SHUTDOWN_TIMEOUT";
/// Path of the authoritative credential store.
pub const KEY_API_KEY_DB: &str = "API_KEY_DB";
/// Path of the compose file describing the container stack.
pub const KEY_COMPOSE_FILE: &str = "COMPOSE_FILE";

/// Default API host.
pub const DEFAULT_API_HOST: &str = "127.0.0.1";
/// Default API port.
pub const DEFAULT_API_PORT: u16 = 8080;
/// Hard-coded server-level shutdown budget, in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 300;

/// Typed view of the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Path the settings were loaded from.
    pub path: PathBuf,
    /// Management API host.
    pub api_host: String,
    /// Management API port.
    pub api_port: u16,
    /// Current credential, if any.
    pub api_key: Option<String>,
    /// Raw `SHUTDOWN_TIMEOUT` value; interpreted by [`effective_shutdown_timeout`].
    pub shutdown_timeout: String,
    /// Authoritative credential store.
    pub key_db: PathBuf,
    /// Compose file for the container stack.
    pub compose_file: PathBuf,
}

impl Settings {
    /// Build the typed view from a parsed file.
    ///
    /// Relative store and compose paths resolve against `stack_dir`.
    pub fn from_file(path: &Path, file: &SettingsFile, stack_dir: &Path) -> Result<Self> {
        let api_port = match file.get(KEY_API_PORT).filter(|v| !v.is_empty()) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: KEY_API_PORT.to_string(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_API_PORT,
        };
        let resolve = |key: &str, default: &str| {
            let raw = file.get(key).filter(|v| !v.is_empty()).unwrap_or(default);
            let p = PathBuf::from(raw);
            if p.is_absolute() { p } else { stack_dir.join(p) }
        };

        Ok(Self {
            path: path.to_path_buf(),
            api_host: file
                .get(KEY_API_HOST)
                .filter(|v| !v.is_empty())
                .unwrap_or(DEFAULT_API_HOST)
                .to_string(),
            api_port,
            api_key: file
                .get(KEY_API_KEY)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            shutdown_timeout: file.get(KEY_SHUTDOWN_TIMEOUT).unwrap_or_default().to_string(),
            key_db: resolve(KEY_API_KEY_DB, "data/api/keys.db"),
            compose_file: resolve(KEY_COMPOSE_FILE, "docker-compose.yml"),
        })
    }

    /// Read and interpret the settings file at `path`.
    pub fn load(path: &Path, stack_dir: &Path) -> Result<Self> {
        let file = read_settings(path)?;
        Self::from_file(path, &file, stack_dir)
    }

    /// Base URL of the management API.
    #[must_use]
    pub fn api_base_url(&self) -> String {
        format!("http://{}:{}", self.api_host, self.api_port)
    }

    /// Server-level shutdown budget with no explicit override.
    #[must_use]
    pub fn shutdown_timeout_secs(&self) -> u64 {
        effective_shutdown_timeout(0, &self.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT_SECS)
    }
}

/// Resolve the server-level shutdown budget.
///
/// Precedence: a positive `override_secs`, then a positive integer
/// `config_value`, then `default_secs`. Zero, negative and unparsable values
/// count as absent.
#[must_use]
pub fn effective_shutdown_timeout(override_secs: i64, config_value: &str, default_secs: u64) -> u64 {
    if override_secs > 0 {
        return override_secs as u64;
    }
    match config_value.trim().parse::<i64>() {
        Ok(v) if v > 0 => v as u64,
        _ => default_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(45, "", 45 ; "override wins")]
    #[test_case(45, "120", 45 ; "override beats config")]
    #[test_case(0, "120", 120 ; "config when no override")]
    #[test_case(0, "", 300 ; "default when config empty")]
    #[test_case(-1, "", 300 ; "negative override is absent")]
    #[test_case(-1, "90", 90 ; "negative override falls to config")]
    #[test_case(0, "0", 300 ; "zero config is absent")]
    #[test_case(0, "-5", 300 ; "negative config is absent")]
    #[test_case(0, "soon", 300 ; "garbage config is absent")]
    #[test_case(0, " 60 ", 60 ; "config is trimmed")]
    fn shutdown_timeout_precedence(override_secs: i64, config: &str, expected: u64) {
        assert_eq!(
            effective_shutdown_timeout(override_secs, config, DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            expected
        );
    }

    #[test]
    fn defaults_apply_to_empty_file() {
        let stack = Path::new("/srv/stack");
        let settings =
            Settings::from_file(&stack.join(".env"), &SettingsFile::default(), stack).expect("settings");
        assert_eq!(settings.api_host, DEFAULT_API_HOST);
        assert_eq!(settings.api_port, DEFAULT_API_PORT);
        assert_eq!(settings.api_key, None);
        assert_eq!(settings.key_db, stack.join("data/api/keys.db"));
        assert_eq!(settings.compose_file, stack.join("docker-compose.yml"));
        assert_eq!(settings.shutdown_timeout_secs(), 300);
        assert_eq!(settings.api_base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn explicit_values_are_used() {
        let file = SettingsFile::parse(
            "API_HOST=api.local\nAPI_PORT=9100\nAPI_KEY=k1\nSHUTDOWN_TIMEOUT=45\nAPI_KEY_DB=/var/keys.db\n",
        );
        let stack = Path::new("/srv/stack");
        let settings = Settings::from_file(&stack.join(".env"), &file, stack).expect("settings");
        assert_eq!(settings.api_base_url(), "http://api.local:9100");
        assert_eq!(settings.api_key.as_deref(), Some("k1"));
        assert_eq!(settings.shutdown_timeout_secs(), 45);
        assert_eq!(settings.key_db, PathBuf::from("/var/keys.db"));
    }

    #[test]
    fn empty_key_is_none() {
        let file = SettingsFile::parse("API_KEY=\n");
        let settings = Settings::from_file(Path::new(".env"), &file, Path::new(".")).expect("settings");
        assert_eq!(settings.api_key, None);
    }

    #[test]
    fn bad_port_is_rejected() {
        let file = SettingsFile::parse("API_PORT=http\n");
        let err = Settings::from_file(Path::new(".env"), &file, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "API_PORT"));
    }
}
