//! Error types for talking to the management API.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by management client calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential is configured, so the request was never sent.
    #[error("no API credential configured")]
    CredentialMissing,

    /// The API rejected the credential.
    #[error("API credential rejected (HTTP {status})")]
    CredentialInvalid {
        /// HTTP status returned by the API.
        status: u16,
    },

    /// The credential store has no non-revoked credential to offer.
    #[error("no active API credential in the credential store")]
    NoActiveCredential,

    /// The refresh path itself failed; carries the error that triggered it.
    #[error("credential refresh failed: {reason} (after: {original})")]
    CredentialRefresh {
        /// The credential error that started the refresh.
        original: Box<ApiError>,
        /// Why the refresh failed.
        reason: String,
    },

    /// Network-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("API returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode API response: {0}")]
    Decode(String),

    /// A caller-supplied argument was unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ApiError {
    /// Whether this error means the credential is absent or stale.
    ///
    /// Only these errors trigger a refresh-and-retry cycle.
    #[must_use]
    pub const fn is_credential(&self) -> bool {
        matches!(self, Self::CredentialMissing | Self::CredentialInvalid { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors from the authoritative credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened.
    #[error("credential store {path} unavailable: {reason}")]
    Unavailable {
        /// Store location.
        path: PathBuf,
        /// Why it could not be opened.
        reason: String,
    },

    /// The lookup query failed.
    #[error("credential store query failed: {0}")]
    Query(String),
}
