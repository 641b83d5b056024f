// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The decrypted secret document.
//!
//! A [`SecretRecord`] exists only inside an unlocked vault session. Secret
//! strings are zeroized when the record (or a value cloned out of it) drops,
//! and `Debug` output never shows them.

use std::collections::BTreeMap;

use backvault_core::{BackendType, BackvaultError, RepositoryId};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Current version of the serialized secret document.
pub const RECORD_FORMAT_VERSION: u32 = 1;

const REDACTED: &str = "[REDACTED]";

/// A secret string that is zeroized on drop and redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

// ---------------------------------------------------------------------------
// Backend credentials
// ---------------------------------------------------------------------------

/// Credentials for an S3-compatible object store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl S3Credentials {
    /// Build S3 credentials, rejecting empty required fields.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self, BackvaultError> {
        let creds = Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: None,
            endpoint: None,
        };
        require(BackendType::S3, "access_key_id", &creds.access_key_id)?;
        require(BackendType::S3, "secret_access_key", &creds.secret_access_key)?;
        Ok(creds)
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &REDACTED)
            .field("secret_access_key", &REDACTED)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Credentials for a B2-style object store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct B2Credentials {
    pub account_id: String,
    pub account_key: String,
}

impl B2Credentials {
    /// Build B2 credentials, rejecting empty required fields.
    pub fn new(
        account_id: impl Into<String>,
        account_key: impl Into<String>,
    ) -> Result<Self, BackvaultError> {
        let creds = Self {
            account_id: account_id.into(),
            account_key: account_key.into(),
        };
        require(BackendType::B2, "account_id", &creds.account_id)?;
        require(BackendType::B2, "account_key", &creds.account_key)?;
        Ok(creds)
    }
}

impl std::fmt::Debug for B2Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("B2Credentials")
            .field("account_id", &REDACTED)
            .field("account_key", &REDACTED)
            .finish()
    }
}

/// A credential set for one backend type. Each variant carries exactly the
/// fields its backend needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendCredentials {
    S3(S3Credentials),
    B2(B2Credentials),
}

impl BackendCredentials {
    pub fn backend_type(&self) -> BackendType {
        match self {
            Self::S3(_) => BackendType::S3,
            Self::B2(_) => BackendType::B2,
        }
    }

    /// Build a typed credential set from key/value pairs (CLI input, legacy
    /// documents).
    ///
    /// Accepts the canonical field names plus common aliases such as
    /// `access_key` / `secret_key` or the `AWS_*` / `B2_*` variable names in
    /// lowercase. A missing required field is an
    /// [`BackvaultError::InvalidCredentials`] error; an unrecognized key is a
    /// [`BackvaultError::Config`] error.
    pub fn from_pairs(
        backend: BackendType,
        pairs: &BTreeMap<String, String>,
    ) -> Result<Self, BackvaultError> {
        let mut fields: BTreeMap<&'static str, &str> = BTreeMap::new();
        for (key, value) in pairs {
            let canonical = canonical_field(backend, key).ok_or_else(|| {
                BackvaultError::Config(format!("unknown {backend} credential field `{key}`"))
            })?;
            fields.insert(canonical, value.as_str());
        }
        let take = |name: &str| fields.get(name).copied().unwrap_or_default();

        match backend {
            BackendType::S3 => {
                let mut creds = S3Credentials::new(take("access_key_id"), take("secret_access_key"))?;
                if let Some(region) = fields.get("region").filter(|v| !v.is_empty()) {
                    creds = creds.with_region(*region);
                }
                if let Some(endpoint) = fields.get("endpoint").filter(|v| !v.is_empty()) {
                    creds = creds.with_endpoint(*endpoint);
                }
                Ok(Self::S3(creds))
            }
            BackendType::B2 => Ok(Self::B2(B2Credentials::new(
                take("account_id"),
                take("account_key"),
            )?)),
        }
    }

    /// Field names and values, for masked display.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::S3(c) => {
                let mut fields = vec![
                    ("access_key_id", c.access_key_id.as_str()),
                    ("secret_access_key", c.secret_access_key.as_str()),
                ];
                if let Some(region) = &c.region {
                    fields.push(("region", region.as_str()));
                }
                if let Some(endpoint) = &c.endpoint {
                    fields.push(("endpoint", endpoint.as_str()));
                }
                fields
            }
            Self::B2(c) => vec![
                ("account_id", c.account_id.as_str()),
                ("account_key", c.account_key.as_str()),
            ],
        }
    }
}

fn require(backend: BackendType, field: &str, value: &str) -> Result<(), BackvaultError> {
    if value.trim().is_empty() {
        return Err(BackvaultError::InvalidCredentials {
            backend,
            field: field.to_string(),
        });
    }
    Ok(())
}

fn canonical_field(backend: BackendType, key: &str) -> Option<&'static str> {
    let key = key.trim().to_ascii_lowercase();
    match backend {
        BackendType::S3 => match key.as_str() {
            "access_key_id" | "access_key" | "aws_access_key_id" => Some("access_key_id"),
            "secret_access_key" | "secret_key" | "aws_secret_access_key" => {
                Some("secret_access_key")
            }
            "region" | "aws_default_region" | "aws_region" => Some("region"),
            "endpoint" | "endpoint_url" | "aws_endpoint_url" => Some("endpoint"),
            _ => None,
        },
        BackendType::B2 => match key.as_str() {
            "account_id" | "b2_account_id" => Some("account_id"),
            "account_key" | "b2_account_key" => Some("account_key"),
            _ => None,
        },
    }
}

// ---------------------------------------------------------------------------
// Entries and the document
// ---------------------------------------------------------------------------

/// Creation time and retrieval accounting of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Successful vault retrievals. Never decreases, including on overwrite.
    #[serde(default)]
    pub access_count: u64,
}

impl AccessMetadata {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_accessed: None,
            access_count: 0,
        }
    }

    fn record_access(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = Some(now);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordEntry {
    pub password: SecretValue,
    #[serde(flatten)]
    pub meta: AccessMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCredentialEntry {
    pub credentials: BackendCredentials,
    #[serde(flatten)]
    pub meta: AccessMetadata,
}

/// Metadata-only view of one stored secret, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub repository_id: RepositoryId,
    /// `None` for the repository password.
    pub backend_type: Option<BackendType>,
    pub meta: AccessMetadata,
}

/// The whole decrypted secret document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub format_version: u32,
    #[serde(default)]
    repository_passwords: BTreeMap<RepositoryId, PasswordEntry>,
    #[serde(default)]
    repository_backends: BTreeMap<RepositoryId, BTreeMap<BackendType, BackendCredentialEntry>>,
}

impl Default for SecretRecord {
    fn default() -> Self {
        Self {
            format_version: RECORD_FORMAT_VERSION,
            repository_passwords: BTreeMap::new(),
            repository_backends: BTreeMap::new(),
        }
    }
}

impl SecretRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a repository password. Replacing keeps the entry's
    /// creation time and access count.
    pub fn set_password(&mut self, id: &RepositoryId, password: &str, now: DateTime<Utc>) {
        let meta = self
            .repository_passwords
            .remove(id)
            .map(|old| old.meta.clone())
            .unwrap_or_else(|| AccessMetadata::new(now));
        self.repository_passwords.insert(
            id.clone(),
            PasswordEntry {
                password: SecretValue::new(password),
                meta,
            },
        );
    }

    /// Return the password and count the access.
    pub fn retrieve_password(&mut self, id: &RepositoryId, now: DateTime<Utc>) -> Option<SecretString> {
        let entry = self.repository_passwords.get_mut(id)?;
        entry.meta.record_access(now);
        Some(SecretString::from(entry.password.expose().to_string()))
    }

    pub fn has_password(&self, id: &RepositoryId) -> bool {
        self.repository_passwords.contains_key(id)
    }

    pub fn password_metadata(&self, id: &RepositoryId) -> Option<&AccessMetadata> {
        self.repository_passwords.get(id).map(|e| &e.meta)
    }

    /// Remove a repository password. Returns whether one was stored.
    pub fn remove_password(&mut self, id: &RepositoryId) -> bool {
        self.repository_passwords.remove(id).is_some()
    }

    /// Insert or replace backend credentials. Replacing keeps the entry's
    /// creation time and access count.
    pub fn set_backend_credentials(
        &mut self,
        id: &RepositoryId,
        credentials: BackendCredentials,
        now: DateTime<Utc>,
    ) {
        let backends = self.repository_backends.entry(id.clone()).or_default();
        let backend = credentials.backend_type();
        let meta = backends
            .remove(&backend)
            .map(|old| old.meta.clone())
            .unwrap_or_else(|| AccessMetadata::new(now));
        backends.insert(backend, BackendCredentialEntry { credentials, meta });
    }

    /// Return a copy of the credentials and count the access.
    pub fn retrieve_backend_credentials(
        &mut self,
        id: &RepositoryId,
        backend: BackendType,
        now: DateTime<Utc>,
    ) -> Option<BackendCredentials> {
        let entry = self.repository_backends.get_mut(id)?.get_mut(&backend)?;
        entry.meta.record_access(now);
        Some(entry.credentials.clone())
    }

    pub fn has_backend_credentials(&self, id: &RepositoryId, backend: BackendType) -> bool {
        self.repository_backends
            .get(id)
            .is_some_and(|backends| backends.contains_key(&backend))
    }

    pub fn backend_metadata(&self, id: &RepositoryId, backend: BackendType) -> Option<&AccessMetadata> {
        self.repository_backends
            .get(id)?
            .get(&backend)
            .map(|e| &e.meta)
    }

    /// Remove one backend's credentials. Returns whether they were stored.
    pub fn remove_backend_credentials(&mut self, id: &RepositoryId, backend: BackendType) -> bool {
        let Some(backends) = self.repository_backends.get_mut(id) else {
            return false;
        };
        let removed = backends.remove(&backend).is_some();
        if backends.is_empty() {
            self.repository_backends.remove(id);
        }
        removed
    }

    /// Every stored secret's metadata, ordered by repository id, password first.
    pub fn summaries(&self) -> Vec<EntrySummary> {
        let mut ids: Vec<&RepositoryId> = self
            .repository_passwords
            .keys()
            .chain(self.repository_backends.keys())
            .collect();
        ids.sort();
        ids.dedup();

        let mut out = Vec::new();
        for id in ids {
            if let Some(entry) = self.repository_passwords.get(id) {
                out.push(EntrySummary {
                    repository_id: id.clone(),
                    backend_type: None,
                    meta: entry.meta.clone(),
                });
            }
            for (backend, entry) in self.repository_backends.get(id).into_iter().flatten() {
                out.push(EntrySummary {
                    repository_id: id.clone(),
                    backend_type: Some(*backend),
                    meta: entry.meta.clone(),
                });
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.repository_passwords.is_empty() && self.repository_backends.is_empty()
    }

    /// Serialize for encryption.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, BackvaultError> {
        serde_json::to_vec(self)
            .map(Zeroizing::new)
            .map_err(|e| BackvaultError::Internal(format!("secret document serialization: {e}")))
    }

    /// Parse a decrypted document, upgrading older formats to the current one.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackvaultError> {
        let probe: VersionProbe = serde_json::from_slice(bytes).map_err(malformed)?;
        match probe.format_version {
            RECORD_FORMAT_VERSION => serde_json::from_slice(bytes).map_err(malformed),
            0 => {
                let legacy: LegacyRecordV0 = serde_json::from_slice(bytes).map_err(malformed)?;
                legacy.upgrade()
            }
            found => Err(BackvaultError::UnsupportedFormat {
                found,
                supported: RECORD_FORMAT_VERSION,
            }),
        }
    }
}

fn malformed(e: serde_json::Error) -> BackvaultError {
    // The serde error may quote document content; keep only its position.
    BackvaultError::Persistence {
        message: format!(
            "secret document is malformed (line {}, column {})",
            e.line(),
            e.column()
        ),
        source: None,
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default)]
    format_version: u32,
}

/// Version 0 documents: no version field, backend credentials as untyped
/// string maps.
#[derive(Deserialize)]
struct LegacyRecordV0 {
    #[serde(default)]
    repository_passwords: BTreeMap<RepositoryId, PasswordEntry>,
    #[serde(default)]
    repository_backends: BTreeMap<RepositoryId, BTreeMap<BackendType, LegacyBackendEntryV0>>,
}

#[derive(Deserialize)]
struct LegacyBackendEntryV0 {
    credentials: BTreeMap<String, String>,
    #[serde(flatten)]
    meta: AccessMetadata,
}

impl LegacyRecordV0 {
    fn upgrade(self) -> Result<SecretRecord, BackvaultError> {
        let mut record = SecretRecord {
            format_version: RECORD_FORMAT_VERSION,
            repository_passwords: self.repository_passwords,
            repository_backends: BTreeMap::new(),
        };
        for (id, backends) in self.repository_backends {
            let mut upgraded = BTreeMap::new();
            for (backend, mut legacy) in backends {
                let credentials = BackendCredentials::from_pairs(backend, &legacy.credentials);
                legacy.credentials.values_mut().for_each(Zeroize::zeroize);
                upgraded.insert(
                    backend,
                    BackendCredentialEntry {
                        credentials: credentials?,
                        meta: legacy.meta,
                    },
                );
            }
            record.repository_backends.insert(id, upgraded);
        }
        Ok(record)
    }
}
