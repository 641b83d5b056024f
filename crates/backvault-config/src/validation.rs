// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes:
//! non-empty distinct paths, KDF cost bounds and a coherent lockout policy.

use crate::diagnostic::ConfigError;
use crate::model::BackvaultConfig;

/// Argon2id memory floor in KiB (32 MiB).
pub const MIN_KDF_MEMORY_COST: u32 = 32768;

/// Argon2id iteration floor.
pub const MIN_KDF_ITERATIONS: u32 = 2;

/// Argon2id memory ceiling in KiB (1 GiB).
pub const MAX_KDF_MEMORY_COST: u32 = 1_048_576;

/// Argon2id iteration ceiling.
pub const MAX_KDF_ITERATIONS: u32 = 10;

/// Argon2id lane ceiling.
pub const MAX_KDF_PARALLELISM: u32 = 16;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &BackvaultConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.vault.path.trim().is_empty() {
        fail("vault.path must not be empty".to_string());
    }

    if config.audit.path.trim().is_empty() {
        fail("audit.path must not be empty".to_string());
    }

    if !config.vault.path.trim().is_empty() && config.vault.path.trim() == config.audit.path.trim()
    {
        fail(format!(
            "vault.path and audit.path must differ, both are `{}`",
            config.vault.path
        ));
    }

    if config.vault.kdf_memory_cost < MIN_KDF_MEMORY_COST {
        fail(format!(
            "vault.kdf_memory_cost must be at least {MIN_KDF_MEMORY_COST} (32 MiB), got {}",
            config.vault.kdf_memory_cost
        ));
    }

    if config.vault.kdf_iterations < MIN_KDF_ITERATIONS {
        fail(format!(
            "vault.kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
            config.vault.kdf_iterations
        ));
    }

    if config.vault.kdf_memory_cost > MAX_KDF_MEMORY_COST {
        fail(format!(
            "vault.kdf_memory_cost must be at most {MAX_KDF_MEMORY_COST} (1 GiB), got {}",
            config.vault.kdf_memory_cost
        ));
    }

    if config.vault.kdf_iterations > MAX_KDF_ITERATIONS {
        fail(format!(
            "vault.kdf_iterations must be at most {MAX_KDF_ITERATIONS}, got {}",
            config.vault.kdf_iterations
        ));
    }

    if !(1..=MAX_KDF_PARALLELISM).contains(&config.vault.kdf_parallelism) {
        fail(format!(
            "vault.kdf_parallelism must be between 1 and {MAX_KDF_PARALLELISM}, got {}",
            config.vault.kdf_parallelism
        ));
    }

    if config.vault.lock_timeout_ms == 0 {
        fail("vault.lock_timeout_ms must be greater than 0".to_string());
    }

    if config.lockout.threshold == 0 {
        fail("lockout.threshold must be at least 1".to_string());
    }

    if config.lockout.base_backoff_secs == 0 {
        fail("lockout.base_backoff_secs must be greater than 0".to_string());
    }

    if config.lockout.max_backoff_secs < config.lockout.base_backoff_secs {
        fail(format!(
            "lockout.max_backoff_secs ({}) must not be below lockout.base_backoff_secs ({})",
            config.lockout.max_backoff_secs, config.lockout.base_backoff_secs
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        fail(format!(
            "logging.level `{}` is not one of: {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
