// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations.
//!
//! Every call to [`seal`] generates a fresh random 96-bit nonce via the system
//! CSPRNG. Nonce reuse would be catastrophic for GCM security.

use backvault_core::BackvaultError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

fn less_safe_key(key: &[u8; 32]) -> Result<LessSafeKey, BackvaultError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| BackvaultError::Crypto("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` with AES-256-GCM, authenticating `aad` alongside it.
///
/// Returns `(ciphertext_with_tag, nonce_bytes)`. The caller must store both,
/// and present the same `aad` to [`open`].
pub fn seal(
    key: &[u8; 32],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), BackvaultError> {
    let key = less_safe_key(key)?;

    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| BackvaultError::Crypto("failed to generate random nonce".to_string()))?;

    // Seal in place: the buffer is extended with the authentication tag.
    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::from(aad),
        &mut in_out,
    )
    .map_err(|_| BackvaultError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    Ok((in_out, nonce_bytes))
}

/// Decrypt a ciphertext produced by [`seal`].
///
/// A wrong key, a modified ciphertext, tag, nonce or `aad` all fail with
/// [`BackvaultError::Authentication`]; corrupted plaintext is never returned.
pub fn open(
    key: &[u8; 32],
    nonce_bytes: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, BackvaultError> {
    let key = less_safe_key(key)?;

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let plaintext_len = key
        .open_in_place(
            Nonce::assume_unique_for_key(*nonce_bytes),
            Aad::from(aad),
            in_out.as_mut_slice(),
        )
        .map_err(|_| BackvaultError::Authentication)?
        .len();
    in_out.truncate(plaintext_len);

    Ok(in_out)
}

/// Generate a random 32-byte key suitable for AES-256-GCM.
pub fn generate_random_key() -> Result<Zeroizing<[u8; 32]>, BackvaultError> {
    let rng = SystemRandom::new();
    let mut key = Zeroizing::new([0u8; 32]);
    rng.fill(key.as_mut())
        .map_err(|_| BackvaultError::Crypto("failed to generate random key".to_string()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = generate_random_key().unwrap();
        let (ciphertext, nonce) = seal(&key, b"repository password", b"hdr").unwrap();
        let decrypted = open(&key, &nonce, &ciphertext, b"hdr").unwrap();
        assert_eq!(decrypted.as_slice(), b"repository password");
    }

    #[test]
    fn seal_uses_fresh_nonces() {
        let key = generate_random_key().unwrap();
        let (ct1, nonce1) = seal(&key, b"same input twice", b"").unwrap();
        let (ct2, nonce2) = seal(&key, b"same input twice", b"").unwrap();
        assert_ne!(nonce1, nonce2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn ciphertext_carries_the_tag() {
        let key = generate_random_key().unwrap();
        let (ciphertext, _) = seal(&key, b"hello", b"").unwrap();
        assert_eq!(ciphertext.len(), 5 + TAG_LEN);
    }

    #[test]
    fn wrong_key_is_an_authentication_error() {
        let key1 = generate_random_key().unwrap();
        let key2 = generate_random_key().unwrap();
        let (ciphertext, nonce) = seal(&key1, b"secret data", b"").unwrap();
        let err = open(&key2, &nonce, &ciphertext, b"").unwrap_err();
        assert!(matches!(err, BackvaultError::Authentication));
    }

    #[test]
    fn mismatched_aad_is_an_authentication_error() {
        let key = generate_random_key().unwrap();
        let (ciphertext, nonce) = seal(&key, b"secret data", b"version=1").unwrap();
        let err = open(&key, &nonce, &ciphertext, b"version=2").unwrap_err();
        assert!(matches!(err, BackvaultError::Authentication));
    }

    #[test]
    fn truncated_ciphertext_is_an_authentication_error() {
        let key = generate_random_key().unwrap();
        let (ciphertext, nonce) = seal(&key, b"secret data", b"").unwrap();
        let err = open(&key, &nonce, &ciphertext[..4], b"").unwrap_err();
        assert!(matches!(err, BackvaultError::Authentication));
    }

    proptest! {
        #[test]
        fn roundtrip_any_plaintext(plaintext in proptest::collection::vec(any::<u8>(), 0..512)) {
            let key = generate_random_key().unwrap();
            let (ciphertext, nonce) = seal(&key, &plaintext, b"aad").unwrap();
            let decrypted = open(&key, &nonce, &ciphertext, b"aad").unwrap();
            prop_assert_eq!(decrypted.as_slice(), plaintext.as_slice());
        }

        #[test]
        fn any_bit_flip_fails_closed(
            plaintext in proptest::collection::vec(any::<u8>(), 1..256),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = generate_random_key().unwrap();
            let (mut ciphertext, nonce) = seal(&key, &plaintext, b"").unwrap();
            let i = position.index(ciphertext.len());
            ciphertext[i] ^= 1 << bit;
            let result = open(&key, &nonce, &ciphertext, b"");
            prop_assert!(matches!(result, Err(BackvaultError::Authentication)));
        }
    }
}
