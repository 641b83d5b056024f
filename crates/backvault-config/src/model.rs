// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Backvault secret vault.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Backvault configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackvaultConfig {
    /// Vault file location, KDF cost and unlock policy.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Failed-unlock lockout policy.
    #[serde(default)]
    pub lockout: LockoutConfig,

    /// Audit log settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Vault file and key derivation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Path of the encrypted vault file.
    #[serde(default = "default_vault_path")]
    pub path: String,

    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB).
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    /// Argon2id iteration count (default: 3).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Argon2id parallelism lanes (default: 4).
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,

    /// Allow unattended unlock with a host-derived key when no master secret
    /// is supplied. Host material has far less entropy than a passphrase.
    #[serde(default)]
    pub auto_unlock: bool,

    /// Upper bound on waiting for the vault lock, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
            auto_unlock: false,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn default_vault_path() -> String {
    data_file("vault.json")
}

fn default_kdf_memory_cost() -> u32 {
    65536 // 64 MiB per OWASP recommendation
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

/// Lockout policy applied after consecutive failed unlock attempts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LockoutConfig {
    /// Consecutive failures that trigger a lockout (default: 5).
    #[serde(default = "default_lockout_threshold")]
    pub threshold: u32,

    /// Lockout length for the failure that reaches the threshold, in seconds.
    /// Doubles with each further failure.
    #[serde(default = "default_base_backoff_secs")]
    pub base_backoff_secs: u64,

    /// Cap on the lockout length, in seconds.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: default_lockout_threshold(),
            base_backoff_secs: default_base_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

fn default_lockout_threshold() -> u32 {
    5
}

fn default_base_backoff_secs() -> u64 {
    30
}

fn default_max_backoff_secs() -> u64 {
    3_600
}

/// Audit log settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Path of the append-only audit log (JSON lines).
    #[serde(default = "default_audit_path")]
    pub path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
        }
    }
}

fn default_audit_path() -> String {
    data_file("audit.jsonl")
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve a file name inside the per-user data directory.
fn data_file(name: &str) -> String {
    dirs::data_dir()
        .map(|d| d.join("backvault").join(name))
        .unwrap_or_else(|| std::path::PathBuf::from(name))
        .display()
        .to_string()
}
