// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit entry types and the hash that chains them together.

use backvault_core::{BackendType, RepositoryId, SecretKind};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

/// Value hashed in place of the previous hash for the first entry.
const GENESIS: &str = "genesis";

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Unlock,
    Lock,
    UnlockFailed,
    SecretStored,
    SecretRetrieved,
    SecretRemoved,
    LockoutTriggered,
}

/// Whether the audited operation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// What an event was about. Identifiers only, never secret values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<RepositoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<BackendType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_kind: Option<SecretKind>,
}

impl AuditSubject {
    /// Subject for vault-wide events (unlock, lock, lockout).
    pub fn vault() -> Self {
        Self::default()
    }

    /// Subject for a repository password.
    pub fn repository_password(repository_id: &RepositoryId) -> Self {
        Self {
            repository_id: Some(repository_id.clone()),
            backend_type: None,
            secret_kind: Some(SecretKind::RepositoryPassword),
        }
    }

    /// Subject for a repository's credentials on one backend.
    pub fn backend_credentials(repository_id: &RepositoryId, backend_type: BackendType) -> Self {
        Self {
            repository_id: Some(repository_id.clone()),
            backend_type: Some(backend_type),
            secret_kind: Some(SecretKind::BackendCredentials),
        }
    }
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub subject: AuditSubject,
    pub outcome: Outcome,
    /// `entry_hash` of the preceding entry, `None` for the first one.
    pub previous_hash: Option<String>,
    /// SHA-256 over the previous hash and every other field of this entry.
    pub entry_hash: String,
}

impl AuditEntry {
    /// Build the next entry of a chain, computing its hash.
    pub(crate) fn chained(
        sequence: u64,
        timestamp: DateTime<Utc>,
        event_type: AuditEventType,
        subject: AuditSubject,
        outcome: Outcome,
        previous_hash: Option<String>,
    ) -> Self {
        let entry_hash = compute_hash(
            previous_hash.as_deref(),
            sequence,
            &timestamp,
            event_type,
            &subject,
            outcome,
        );
        Self {
            sequence,
            timestamp,
            event_type,
            subject,
            outcome,
            previous_hash,
            entry_hash,
        }
    }

    /// Recompute this entry's hash from its fields.
    pub fn expected_hash(&self) -> String {
        compute_hash(
            self.previous_hash.as_deref(),
            self.sequence,
            &self.timestamp,
            self.event_type,
            &self.subject,
            self.outcome,
        )
    }
}

fn compute_hash(
    previous_hash: Option<&str>,
    sequence: u64,
    timestamp: &DateTime<Utc>,
    event_type: AuditEventType,
    subject: &AuditSubject,
    outcome: Outcome,
) -> String {
    let mut hasher = Sha256::new();
    for field in [
        previous_hash.unwrap_or(GENESIS).to_string(),
        sequence.to_string(),
        timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
        event_type.to_string(),
        subject
            .repository_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default(),
        subject
            .backend_type
            .map(|b| b.to_string())
            .unwrap_or_default(),
        subject
            .secret_kind
            .map(|k| k.to_string())
            .unwrap_or_default(),
        outcome.to_string(),
    ] {
        hasher.update(field.as_bytes());
        // Field separator so ("ab", "c") and ("a", "bc") hash differently.
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
