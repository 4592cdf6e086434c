//! API credentials and the authoritative credential store.
//!
//! - [`Credential`]: the opaque key sent with every request
//! - [`CredentialStore`]: source of truth consulted on refresh
//! - [`SqliteCredentialStore`]: the API's own key database, opened read-only

use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::StoreError;

/// An API credential, zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    key: String,
}

impl Credential {
    /// Wrap a key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Wrap a key unless it is empty.
    #[must_use]
    pub fn from_optional(key: Option<&str>) -> Option<Self> {
        key.filter(|k| !k.is_empty()).map(Self::new)
    }

    /// The key as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// A display-safe form showing only the first four characters.
    #[must_use]
    pub fn masked(&self) -> String {
        let prefix: String = self.key.chars().take(4).collect();
        if self.key.chars().count() > 8 {
            format!("{prefix}********")
        } else {
            "********".to_string()
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("key", &self.masked()).finish()
    }
}

/// Source of the newest valid credential.
pub trait CredentialStore: Send + Sync {
    /// The newest non-revoked credential, or `None` if every key is revoked.
    fn newest_active(&self) -> Result<Option<Credential>, StoreError>;

    /// Where the store lives, for operator messages.
    fn describe(&self) -> String;
}

/// Credential store backed by the API's SQLite key table.
///
/// Expects `api_keys(key TEXT, revoked INTEGER, created_at INTEGER)`.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    path: PathBuf,
}

impl SqliteCredentialStore {
    /// Create a store reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Database location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::Unavailable {
                path: self.path.clone(),
                reason: "file does not exist".to_string(),
            });
        }
        Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|e| {
            StoreError::Unavailable {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn newest_active(&self) -> Result<Option<Credential>, StoreError> {
        let conn = self.open()?;
        let key: Option<String> = conn
            .query_row(
                "SELECT key FROM api_keys \
                 WHERE revoked = 0 AND key <> '' \
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        debug!(path = %self.path.display(), found = key.is_some(), "queried credential store");
        Ok(key.map(Credential::new))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
