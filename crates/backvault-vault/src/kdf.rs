// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id key derivation from a master secret or host-derived secret.
//!
//! Derives a 32-byte key using Argon2id (Algorithm::Argon2id, Version::V0x13).
//! The cost parameters travel in the vault file header so a vault created with
//! one configuration can still be opened after the defaults change.

use backvault_config::model::VaultConfig;
use backvault_config::validation::{
    MAX_KDF_ITERATIONS, MAX_KDF_MEMORY_COST, MAX_KDF_PARALLELISM, MIN_KDF_ITERATIONS,
    MIN_KDF_MEMORY_COST,
};
use backvault_core::BackvaultError;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Argon2id cost parameters recorded in the vault header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Parameters for newly written key slots.
    pub fn from_config(config: &VaultConfig) -> Self {
        Self {
            memory_cost: config.kdf_memory_cost,
            iterations: config.kdf_iterations,
            parallelism: config.kdf_parallelism,
        }
    }

    /// Whether these parameters fall inside the range accepted from
    /// configuration. A vault header outside it is not derived from.
    pub fn is_within_bounds(&self) -> bool {
        (MIN_KDF_MEMORY_COST..=MAX_KDF_MEMORY_COST).contains(&self.memory_cost)
            && (MIN_KDF_ITERATIONS..=MAX_KDF_ITERATIONS).contains(&self.iterations)
            && (1..=MAX_KDF_PARALLELISM).contains(&self.parallelism)
    }
}

/// Derive a 32-byte key from `secret` using Argon2id.
///
/// The returned key is wrapped in [`Zeroizing`] for automatic memory zeroing
/// on drop.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>, BackvaultError> {
    let argon_params = argon2::Params::new(
        params.memory_cost,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| BackvaultError::Crypto(format!("invalid Argon2id parameters: {e}")))?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon_params,
    );

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(secret, salt, output.as_mut())
        .map_err(|e| BackvaultError::Crypto(format!("Argon2id key derivation failed: {e}")))?;

    Ok(output)
}

/// Generate a random salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN], BackvaultError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| BackvaultError::Crypto("failed to generate random salt".to_string()))?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Low cost for fast tests.
    const TEST_PARAMS: KdfParams = KdfParams {
        memory_cost: 32768,
        iterations: 2,
        parallelism: 1,
    };

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [1u8; SALT_LEN];
        let key1 = derive_key(b"master secret", &salt, &TEST_PARAMS).unwrap();
        let key2 = derive_key(b"master secret", &salt, &TEST_PARAMS).unwrap();
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn different_secret_or_salt_changes_the_key() {
        let salt = [2u8; SALT_LEN];
        let base = derive_key(b"secret one", &salt, &TEST_PARAMS).unwrap();
        let other_secret = derive_key(b"secret two", &salt, &TEST_PARAMS).unwrap();
        let other_salt = derive_key(b"secret one", &[3u8; SALT_LEN], &TEST_PARAMS).unwrap();
        assert_ne!(*base, *other_secret);
        assert_ne!(*base, *other_salt);
    }

    #[test]
    fn iterations_are_part_of_the_derivation() {
        let salt = [4u8; SALT_LEN];
        let more = KdfParams {
            iterations: 3,
            ..TEST_PARAMS
        };
        let a = derive_key(b"secret", &salt, &TEST_PARAMS).unwrap();
        let b = derive_key(b"secret", &salt, &more).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let bad = KdfParams {
            memory_cost: 1,
            iterations: 0,
            parallelism: 0,
        };
        let err = derive_key(b"secret", &[0u8; SALT_LEN], &bad).unwrap_err();
        assert!(matches!(err, BackvaultError::Crypto(_)));
    }

    #[test]
    fn bounds_match_configuration_limits() {
        assert!(TEST_PARAMS.is_within_bounds());
        assert!(KdfParams::from_config(&VaultConfig::default()).is_within_bounds());
        assert!(
            !KdfParams {
                iterations: 200,
                ..TEST_PARAMS
            }
            .is_within_bounds()
        );
        assert!(
            !KdfParams {
                memory_cost: MAX_KDF_MEMORY_COST + 1,
                ..TEST_PARAMS
            }
            .is_within_bounds()
        );
        assert!(
            !KdfParams {
                parallelism: 0,
                ..TEST_PARAMS
            }
            .is_within_bounds()
        );
    }

    #[test]
    fn generate_salt_produces_random_values() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
    }
}
