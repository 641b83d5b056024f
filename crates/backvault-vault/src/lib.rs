// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM encrypted secret vault for backup repositories.
//!
//! Stores repository passwords and per-repository backend credentials in one
//! encrypted file, using a key-wrapping pattern: a random data key encrypts
//! the secret document, and the data key itself is protected by a key derived
//! from the master secret (and optionally the host identity) via Argon2id.
//! [`ResolutionEngine`] answers which credential a backend adapter should use.

pub mod auto_unlock;
pub mod crypto;
pub mod file;
pub mod kdf;
pub mod lockout;
pub mod prompt;
pub mod record;
pub mod resolver;
pub mod vault;

pub use auto_unlock::{HostFingerprint, HostIdentity, SystemHost};
pub use prompt::{read_new_passphrase, read_passphrase};
pub use record::{AccessMetadata, B2Credentials, BackendCredentials, EntrySummary, S3Credentials};
pub use resolver::{Environment, MapEnv, ProcessEnv, ResolutionEngine, Resolved, ResolvedFrom};
pub use vault::{Vault, VaultStatus, mask_secret};
