// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Backvault secret vault.
//!
//! Credential values never appear in any variant. Authentication failures
//! read the same whether the secret was wrong or the vault file is corrupt.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::BackendType;

/// The error type returned by every vault, audit and resolution operation.
#[derive(Debug, Error)]
pub enum BackvaultError {
    /// An operation needing decrypted secrets was issued while the vault is
    /// locked or locked out.
    #[error("vault is locked -- unlock it before accessing secrets")]
    VaultLocked,

    /// Wrong master secret, wrong host key, or tampered ciphertext.
    #[error("authentication failed -- invalid secret or corrupted vault")]
    Authentication,

    /// No credential could be resolved along any precedence path.
    #[error("no {what} configured for repository {repository_id}")]
    NotFound {
        /// What was being resolved, e.g. "repository password" or "s3 credentials".
        what: String,
        /// The repository the lookup was made for.
        repository_id: String,
    },

    /// Unlock attempted during a lockout window.
    #[error("vault locked out after repeated failed unlocks, try again after {until}")]
    Lockout { until: DateTime<Utc> },

    /// Reading or writing the vault file failed.
    #[error("vault persistence error: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Appending to the audit log failed. The triggering operation is aborted.
    #[error("audit log write failed: {message}")]
    AuditWrite {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The vault file does not exist yet.
    #[error("vault has not been initialized")]
    NotInitialized,

    /// Unattended unlock was requested but is disabled or has no host key slot.
    #[error("auto-unlock unavailable: {0}")]
    AutoUnlockUnavailable(String),

    /// A credential set is missing a field its backend requires.
    #[error("invalid {backend} credentials: missing required field `{field}`")]
    InvalidCredentials { backend: BackendType, field: String },

    /// The vault file or secret document uses a format this build cannot read.
    #[error("unsupported vault format version {found} (newest supported: {supported})")]
    UnsupportedFormat { found: u32, supported: u32 },

    /// Key derivation or cipher setup failure (not an authentication failure).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Invalid runtime configuration handed to the vault.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operator input could not be read or was rejected (passphrase prompt,
    /// CLI values).
    #[error("input error: {0}")]
    Input(String),

    /// The vault lock could not be acquired in time.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BackvaultError {
    /// Build a [`BackvaultError::Persistence`] from an I/O error.
    pub fn persistence(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Persistence {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Build a [`BackvaultError::AuditWrite`] from an I/O error.
    pub fn audit_write(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::AuditWrite {
            message: message.into(),
            source: Some(source),
        }
    }

    /// True for errors a backend adapter may recover from by falling through to
    /// the next resolution path or reporting "no credentials configured".
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
