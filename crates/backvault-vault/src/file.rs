// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The vault file: unencrypted header, key slots, encrypted payload.
//!
//! A random data key encrypts the secret document. The data key is wrapped
//! once per key slot:
//! - the passphrase slot, under Argon2id(master secret, header salt);
//! - the optional host slot, under Argon2id(host secret, slot salt).
//!
//! Changing the passphrase or toggling auto-unlock only rewrites a slot.
//! The lockout counters sit beside the header so they can be updated without
//! the data key.

use std::fs;
use std::io::Write;
use std::path::Path;

use backvault_core::BackvaultError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::{self, NONCE_LEN};
use crate::kdf::{self, KdfParams, SALT_LEN};
use crate::lockout::LockoutState;
use crate::record::SecretRecord;

/// Current on-disk format version.
pub const VAULT_FORMAT_VERSION: u32 = 1;

/// The only supported key derivation function.
pub const KDF_ALGORITHM: &str = "argon2id";

const PASSPHRASE_SLOT_AAD: &[u8] = b"backvault:key-slot:passphrase";
const HOST_SLOT_AAD: &[u8] = b"backvault:key-slot:host";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfSection {
    pub algorithm: String,
    #[serde(flatten)]
    pub params: KdfParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultHeader {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    /// Hex salt for the passphrase slot.
    pub salt: String,
    pub kdf: KdfSection,
}

impl VaultHeader {
    /// Associated data binding the payload to this header.
    fn payload_aad(&self) -> Vec<u8> {
        format!(
            "backvault:v{}:{}",
            self.format_version,
            self.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )
        .into_bytes()
    }
}

/// One wrapped copy of the data key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySlot {
    /// Hex salt, for slots that do not use the header salt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Hex nonce.
    pub nonce: String,
    /// Base64 ciphertext with GCM tag.
    pub wrapped_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<KeySlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<KeySlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Hex nonce.
    pub nonce: String,
    /// Base64 ciphertext with GCM tag.
    pub ciphertext: String,
}

/// The complete vault file as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultFile {
    pub header: VaultHeader,
    pub key_slots: KeySlots,
    pub payload: Payload,
    #[serde(default)]
    pub lockout: LockoutState,
}

impl VaultFile {
    /// A new vault holding `record`, with no key slots yet.
    pub fn create(
        data_key: &[u8; 32],
        record: &SecretRecord,
        params: KdfParams,
        created_at: DateTime<Utc>,
    ) -> Result<Self, BackvaultError> {
        let mut file = Self {
            header: VaultHeader {
                format_version: VAULT_FORMAT_VERSION,
                created_at,
                salt: hex::encode(kdf::generate_salt()?),
                kdf: KdfSection {
                    algorithm: KDF_ALGORITHM.to_string(),
                    params,
                },
            },
            key_slots: KeySlots::default(),
            payload: Payload {
                nonce: String::new(),
                ciphertext: String::new(),
            },
            lockout: LockoutState::default(),
        };
        file.seal_payload(data_key, record)?;
        Ok(file)
    }

    /// Read the vault file. `Ok(None)` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, BackvaultError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BackvaultError::persistence(
                    format!("cannot read vault file {}", path.display()),
                    e,
                ));
            }
        };

        let file: Self = serde_json::from_str(&contents).map_err(|e| BackvaultError::Persistence {
            message: format!("vault file {} is not readable: {e}", path.display()),
            source: None,
        })?;

        if file.header.format_version > VAULT_FORMAT_VERSION {
            return Err(BackvaultError::UnsupportedFormat {
                found: file.header.format_version,
                supported: VAULT_FORMAT_VERSION,
            });
        }
        if file.header.kdf.algorithm != KDF_ALGORITHM {
            return Err(BackvaultError::Persistence {
                message: format!(
                    "vault file uses unsupported key derivation `{}`",
                    file.header.kdf.algorithm
                ),
                source: None,
            });
        }
        if !file.header.kdf.params.is_within_bounds() {
            let params = file.header.kdf.params;
            return Err(BackvaultError::Persistence {
                message: format!(
                    "vault file key derivation parameters out of range \
                     (memory_cost={}, iterations={}, parallelism={})",
                    params.memory_cost, params.iterations, params.parallelism
                ),
                source: None,
            });
        }
        Ok(Some(file))
    }

    /// Write the file atomically: temp file in the same directory, fsync,
    /// rename over the target, fsync the directory.
    ///
    /// On failure the previous file is left untouched.
    pub fn persist(&self, path: &Path) -> Result<(), BackvaultError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| {
            BackvaultError::persistence(format!("cannot create {}", dir.display()), e)
        })?;

        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| BackvaultError::Internal(format!("vault file serialization: {e}")))?;

        let write_err = |e: std::io::Error| {
            BackvaultError::persistence(format!("cannot write vault file {}", path.display()), e)
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        set_owner_only(tmp.path()).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        sync_dir(dir).map_err(write_err)?;

        debug!(path = %path.display(), "vault file persisted");
        Ok(())
    }

    pub fn has_passphrase_slot(&self) -> bool {
        self.key_slots.passphrase.is_some()
    }

    pub fn has_host_slot(&self) -> bool {
        self.key_slots.host.is_some()
    }

    /// Wrap `data_key` under `passphrase` with a fresh header salt.
    pub fn set_passphrase_slot(
        &mut self,
        data_key: &[u8; 32],
        passphrase: &SecretString,
    ) -> Result<(), BackvaultError> {
        let salt = kdf::generate_salt()?;
        let wrapping_key = kdf::derive_key(
            passphrase.expose_secret().as_bytes(),
            &salt,
            &self.header.kdf.params,
        )?;
        let (wrapped, nonce) = crypto::seal(&wrapping_key, data_key, PASSPHRASE_SLOT_AAD)?;
        self.header.salt = hex::encode(salt);
        self.key_slots.passphrase = Some(KeySlot {
            salt: None,
            nonce: hex::encode(nonce),
            wrapped_key: BASE64.encode(wrapped),
        });
        Ok(())
    }

    /// Wrap `data_key` under the host secret with a fresh slot salt.
    pub fn set_host_slot(
        &mut self,
        data_key: &[u8; 32],
        host_secret: &SecretString,
    ) -> Result<(), BackvaultError> {
        let salt = kdf::generate_salt()?;
        let wrapping_key = kdf::derive_key(
            host_secret.expose_secret().as_bytes(),
            &salt,
            &self.header.kdf.params,
        )?;
        let (wrapped, nonce) = crypto::seal(&wrapping_key, data_key, HOST_SLOT_AAD)?;
        self.key_slots.host = Some(KeySlot {
            salt: Some(hex::encode(salt)),
            nonce: hex::encode(nonce),
            wrapped_key: BASE64.encode(wrapped),
        });
        Ok(())
    }

    /// Drop the host slot. Returns whether one existed.
    pub fn remove_host_slot(&mut self) -> bool {
        self.key_slots.host.take().is_some()
    }

    /// Recover the data key from the passphrase slot.
    ///
    /// A wrong passphrase, a tampered slot, or a vault without a passphrase
    /// slot are all [`BackvaultError::Authentication`].
    pub fn unwrap_with_passphrase(
        &self,
        passphrase: &SecretString,
    ) -> Result<Zeroizing<[u8; 32]>, BackvaultError> {
        let slot = self
            .key_slots
            .passphrase
            .as_ref()
            .ok_or(BackvaultError::Authentication)?;
        let salt = decode_salt(&self.header.salt)?;
        self.unwrap_slot(slot, &salt, passphrase, PASSPHRASE_SLOT_AAD)
    }

    /// Recover the data key from the host slot.
    pub fn unwrap_with_host(
        &self,
        host_secret: &SecretString,
    ) -> Result<Zeroizing<[u8; 32]>, BackvaultError> {
        let slot = self.key_slots.host.as_ref().ok_or_else(|| {
            BackvaultError::AutoUnlockUnavailable("vault has no host key slot".to_string())
        })?;
        let salt = slot
            .salt
            .as_deref()
            .ok_or(BackvaultError::Authentication)
            .and_then(decode_salt)?;
        self.unwrap_slot(slot, &salt, host_secret, HOST_SLOT_AAD)
    }

    fn unwrap_slot(
        &self,
        slot: &KeySlot,
        salt: &[u8; SALT_LEN],
        secret: &SecretString,
        aad: &[u8],
    ) -> Result<Zeroizing<[u8; 32]>, BackvaultError> {
        let nonce = decode_nonce(&slot.nonce)?;
        let wrapped = decode_base64(&slot.wrapped_key)?;
        let wrapping_key =
            kdf::derive_key(secret.expose_secret().as_bytes(), salt, &self.header.kdf.params)?;
        let plaintext = crypto::open(&wrapping_key, &nonce, &wrapped, aad)?;
        let key: [u8; 32] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| BackvaultError::Authentication)?;
        Ok(Zeroizing::new(key))
    }

    /// Decrypt the secret document.
    pub fn open_payload(&self, data_key: &[u8; 32]) -> Result<SecretRecord, BackvaultError> {
        let nonce = decode_nonce(&self.payload.nonce)?;
        let ciphertext = decode_base64(&self.payload.ciphertext)?;
        let plaintext = crypto::open(data_key, &nonce, &ciphertext, &self.header.payload_aad())?;
        SecretRecord::from_bytes(&plaintext)
    }

    /// Encrypt `record` as the new payload under a fresh nonce.
    pub fn seal_payload(
        &mut self,
        data_key: &[u8; 32],
        record: &SecretRecord,
    ) -> Result<(), BackvaultError> {
        let plaintext = record.to_bytes()?;
        let (ciphertext, nonce) = crypto::seal(data_key, &plaintext, &self.header.payload_aad())?;
        self.payload = Payload {
            nonce: hex::encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
        };
        Ok(())
    }
}

fn decode_salt(encoded: &str) -> Result<[u8; SALT_LEN], BackvaultError> {
    hex::decode(encoded)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(BackvaultError::Authentication)
}

fn decode_nonce(encoded: &str) -> Result<[u8; NONCE_LEN], BackvaultError> {
    hex::decode(encoded)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(BackvaultError::Authentication)
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, BackvaultError> {
    BASE64
        .decode(encoded)
        .map_err(|_| BackvaultError::Authentication)
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
