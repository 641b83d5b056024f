// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./backvault.toml` > `~/.config/backvault/backvault.toml`
//! > `/etc/backvault/backvault.toml` with environment variable overrides via
//! the `BACKVAULT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BackvaultConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/backvault/backvault.toml";

/// Config file looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = "backvault.toml";

/// Environment variables under the `BACKVAULT_` prefix that are not config keys.
///
/// `BACKVAULT_PASSPHRASE` carries the master secret and must never be merged
/// into (or echoed back by) the configuration.
const NON_CONFIG_ENV_KEYS: &[&str] = &["passphrase"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/backvault/backvault.toml` (system-wide)
/// 3. `~/.config/backvault/backvault.toml` (user XDG config)
/// 4. `./backvault.toml` (local directory)
/// 5. `BACKVAULT_*` environment variables
pub fn load_config() -> Result<BackvaultConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<BackvaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BackvaultConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BackvaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BackvaultConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(BackvaultConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Path of the per-user config file, if the platform has a config directory.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("backvault/backvault.toml"))
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `BACKVAULT_VAULT_KDF_MEMORY_COST` must map to
/// `vault.kdf_memory_cost`, not `vault.kdf.memory.cost`.
fn env_provider() -> Env {
    Env::prefixed("BACKVAULT_")
        .ignore(NON_CONFIG_ENV_KEYS)
        .map(|key| {
            // `key` keeps the env var's case with the prefix stripped.
            // Example: BACKVAULT_LOCKOUT_THRESHOLD -> "LOCKOUT_THRESHOLD" -> "lockout.threshold"
            let mapped = key
                .as_str()
                .to_ascii_lowercase()
                .replacen("vault_", "vault.", 1)
                .replacen("lockout_", "lockout.", 1)
                .replacen("audit_", "audit.", 1)
                .replacen("logging_", "logging.", 1);
            mapped.into()
        })
}
