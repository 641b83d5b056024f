// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host-derived secret for unattended unlock.
//!
//! The material (machine id, host name, user name) is not secret. A host slot
//! only protects the vault against being copied to another machine or user
//! account.

use backvault_core::BackvaultError;
use secrecy::SecretString;
use sha2::{Digest, Sha256};

const FINGERPRINT_DOMAIN: &[u8] = b"backvault-host-v1";

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Source of the host secret used by the host key slot.
pub trait HostIdentity: Send + Sync {
    fn host_secret(&self) -> Result<SecretString, BackvaultError>;
}

/// Non-secret facts identifying this machine and account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFingerprint {
    pub machine_id: Option<String>,
    pub host_name: Option<String>,
    pub user_name: Option<String>,
}

impl HostFingerprint {
    /// Collect from the running system.
    pub fn collect() -> Self {
        Self {
            machine_id: read_machine_id(),
            host_name: sysinfo::System::host_name().filter(|h| !h.trim().is_empty()),
            user_name: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .ok()
                .filter(|u| !u.trim().is_empty()),
        }
    }

    /// Hash the collected facts into the host secret.
    ///
    /// Fails with [`BackvaultError::AutoUnlockUnavailable`] when nothing could
    /// be collected.
    pub fn derive_secret(&self) -> Result<SecretString, BackvaultError> {
        if self.machine_id.is_none() && self.host_name.is_none() && self.user_name.is_none() {
            return Err(BackvaultError::AutoUnlockUnavailable(
                "no host identity available (machine id, host name, user)".to_string(),
            ));
        }
        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_DOMAIN);
        for part in [&self.machine_id, &self.host_name, &self.user_name] {
            hasher.update([0u8]);
            hasher.update(part.as_deref().unwrap_or_default().trim().as_bytes());
        }
        Ok(SecretString::from(hex::encode(hasher.finalize())))
    }
}

fn read_machine_id() -> Option<String> {
    MACHINE_ID_PATHS.iter().find_map(|path| {
        std::fs::read_to_string(path)
            .ok()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
    })
}

/// The identity of the machine and account this process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostIdentity for SystemHost {
    fn host_secret(&self) -> Result<SecretString, BackvaultError> {
        HostFingerprint::collect().derive_secret()
    }
}

impl HostIdentity for HostFingerprint {
    fn host_secret(&self) -> Result<SecretString, BackvaultError> {
        self.derive_secret()
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn fingerprint(machine: &str, host: &str, user: &str) -> HostFingerprint {
        HostFingerprint {
            machine_id: Some(machine.to_string()),
            host_name: Some(host.to_string()),
            user_name: Some(user.to_string()),
        }
    }

    #[test]
    fn derivation_is_stable() {
        let a = fingerprint("abc123", "nas", "backup").derive_secret().unwrap();
        let b = fingerprint("abc123", "nas", "backup").derive_secret().unwrap();
        assert_eq!(a.expose_secret(), b.expose_secret());
        assert_eq!(a.expose_secret().len(), 64);
    }

    #[test]
    fn each_fact_changes_the_secret() {
        let base = fingerprint("abc123", "nas", "backup").derive_secret().unwrap();
        for other in [
            fingerprint("abc124", "nas", "backup"),
            fingerprint("abc123", "nas2", "backup"),
            fingerprint("abc123", "nas", "root"),
        ] {
            assert_ne!(base.expose_secret(), other.derive_secret().unwrap().expose_secret());
        }
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = fingerprint("ab", "c", "user").derive_secret().unwrap();
        let b = fingerprint("a", "bc", "user").derive_secret().unwrap();
        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[test]
    fn empty_fingerprint_is_unavailable() {
        let err = HostFingerprint::default().derive_secret().unwrap_err();
        assert!(matches!(err, BackvaultError::AutoUnlockUnavailable(_)));
    }

    #[test]
    fn system_host_collects_something() {
        let collected = HostFingerprint::collect();
        if collected != HostFingerprint::default() {
            assert!(SystemHost.host_secret().is_ok());
        }
    }
}
