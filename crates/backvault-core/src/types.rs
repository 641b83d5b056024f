// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the vault, audit log and CLI.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumIter, EnumString};

/// Number of SHA-256 bytes kept in a [`RepositoryId`].
const REPOSITORY_ID_BYTES: usize = 16;

/// Stable identifier of a backup repository.
///
/// Derived from the repository location string (`s3:host/bucket/repo`,
/// `b2:bucket:path`, `/srv/backups`, ...) as the hex encoding of the first
/// 16 bytes of its SHA-256 digest. The same location always yields the same
/// id; the location itself is never stored in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Derive the id for a repository location string.
    pub fn from_location(location: &str) -> Self {
        let digest = Sha256::digest(location.as_bytes());
        Self(hex::encode(&digest[..REPOSITORY_ID_BYTES]))
    }

    /// Wrap an id that was previously derived (e.g. read back from the audit log).
    ///
    /// Returns `None` unless `raw` is 32 lowercase hex characters.
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = raw.len() == REPOSITORY_ID_BYTES * 2
            && raw.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage-service category a set of backend credentials applies to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// S3-compatible object stores (AWS, MinIO, Wasabi, ...).
    S3,
    /// Backblaze B2-style object stores.
    B2,
}

/// Which kind of secret an operation touched. Used in audit subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
    RepositoryPassword,
    BackendCredentials,
}
