//! Line-oriented `KEY=VALUE` settings file.
//!
//! Only the assignment being changed is re-rendered; every other line,
//! including its `export` prefix and quoting, is written back byte for byte.
//! Every write is a
//! whole-file read followed by an atomic replace (temp file + rename in the
//! same directory). There is no locking: concurrent writers race and the last
//! one wins.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry {
        key: String,
        value: String,
        exported: bool,
        /// Original text; dropped once the value changes.
        raw: Option<String>,
    },
    Other(String),
}

/// Parsed settings file, preserving the original line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsFile {
    lines: Vec<Line>,
}

impl SettingsFile {
    /// Parse settings from text.
    ///
    /// Lines that are not `KEY=VALUE` pairs are kept verbatim. A leading
    /// `export ` is accepted and matching surrounding quotes are stripped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|raw| match parse_entry(raw) {
                Some((key, value, exported)) => Line::Entry {
                    key,
                    value,
                    exported,
                    raw: Some(raw.to_string()),
                },
                None => Line::Other(raw.to_string()),
            })
            .collect();
        Self { lines }
    }

    /// Look up a value. The last assignment of a key wins, like a shell would.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            Line::Entry { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set a value, replacing the last existing assignment or appending one.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if !is_valid_key(key) {
            return Err(ConfigError::InvalidKey(key.to_string()));
        }
        let existing = self.lines.iter_mut().rev().find_map(|line| match line {
            Line::Entry { key: k, value, raw, .. } if k == key => Some((value, raw)),
            _ => None,
        });
        match existing {
            Some((slot, _)) if slot.as_str() == value => {}
            Some((slot, raw)) => {
                value.clone_into(slot);
                *raw = None;
            }
            None => self.lines.push(Line::Entry {
                key: key.to_string(),
                value: value.to_string(),
                exported: false,
                raw: None,
            }),
        }
        Ok(())
    }

    /// Iterate over `(key, value)` pairs in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            Line::Entry { key, value, .. } => Some((key.as_str(), value.as_str())),
            Line::Other(_) => None,
        })
    }

    /// Render back to text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Entry { raw: Some(raw), .. } | Line::Other(raw) => out.push_str(raw),
                Line::Entry {
                    key,
                    value,
                    exported,
                    raw: None,
                } => {
                    if *exported {
                        out.push_str("export ");
                    }
                    out.push_str(key);
                    out.push('=');
                    out.push_str(&quote_if_needed(value));
                }
            }
            out.push('\n');
        }
        out
    }
}

fn parse_entry(raw: &str) -> Option<(String, String, bool)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (trimmed, exported) = match trimmed.strip_prefix("export ") {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };
    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if !is_valid_key(key) {
        return None;
    }
    Some((key.to_string(), unquote(value.trim()).to_string(), exported))
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn quote_if_needed(value: &str) -> String {
    // Single quotes stop compose from interpolating `$`.
    if value.contains('$') && !value.contains('\'') {
        format!("'{value}'")
    } else if value.contains(char::is_whitespace) || value.contains('#') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Read a settings file. A missing file yields empty settings.
pub fn read_settings(path: &Path) -> Result<SettingsFile> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(SettingsFile::parse(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "settings file not found, using defaults");
            Ok(SettingsFile::default())
        }
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Atomically replace the settings file with `settings`.
pub fn write_settings(path: &Path, settings: &SettingsFile) -> Result<()> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(settings.render().as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    // Owner-only: the file carries the API credential.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600)).map_err(write_err)?;
    }

    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!(path = %path.display(), "settings file rewritten");
    Ok(())
}

/// Read-modify-write a single key.
pub fn update_setting(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut settings = read_settings(path)?;
    settings.set(key, value)?;
    write_settings(path, &settings)
}
