// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential resolution for backend adapters.
//!
//! Precedence, first match wins:
//! 1. the explicit value passed by the caller (never persisted);
//! 2. the vault, auto-unlocking first when configuration permits;
//! 3. the process environment.
//!
//! Adapters call the engine for every operation and do not cache results.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use backvault_core::{BackendType, BackvaultError, RepositoryId};
use secrecy::SecretString;
use tracing::debug;

use crate::record::BackendCredentials;
use crate::vault::{Vault, VaultStatus};

/// Environment variable holding a repository password.
pub const PASSWORD_ENV_VAR: &str = "RESTIC_PASSWORD";

/// Environment variables per credential field, by backend.
pub fn credential_env_vars(backend: BackendType) -> &'static [(&'static str, &'static str)] {
    match backend {
        BackendType::S3 => &[
            ("access_key_id", "AWS_ACCESS_KEY_ID"),
            ("secret_access_key", "AWS_SECRET_ACCESS_KEY"),
            ("region", "AWS_DEFAULT_REGION"),
            ("endpoint", "AWS_ENDPOINT_URL"),
        ],
        BackendType::B2 => &[("account_id", "B2_ACCOUNT_ID"), ("account_key", "B2_ACCOUNT_KEY")],
    }
}

/// Read access to environment variables.
pub trait Environment: Send + Sync {
    /// The variable's value; unset and empty are both `None`.
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

/// A fixed set of variables.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl Environment for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.0.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

/// Which precedence step produced a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFrom {
    Explicit,
    Vault,
    Environment,
}

impl std::fmt::Display for ResolvedFrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedFrom::Explicit => write!(f, "explicit value"),
            ResolvedFrom::Vault => write!(f, "vault"),
            ResolvedFrom::Environment => write!(f, "environment"),
        }
    }
}

/// A resolved credential and where it came from.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub from: ResolvedFrom,
}

impl<T> Resolved<T> {
    fn new(value: T, from: ResolvedFrom) -> Self {
        Self { value, from }
    }
}

/// Whether the vault step can be consulted.
enum VaultStep {
    Unlocked,
    /// Locked (or locked out) and not auto-unlockable.
    Locked,
    Uninitialized,
}

/// Answers "which credential should the backend adapter use".
pub struct ResolutionEngine {
    vault: Arc<Vault>,
    env: Box<dyn Environment>,
}

impl ResolutionEngine {
    /// An engine reading the process environment.
    pub fn new(vault: Arc<Vault>) -> Self {
        Self::with_environment(vault, ProcessEnv)
    }

    pub fn with_environment(vault: Arc<Vault>, env: impl Environment + 'static) -> Self {
        Self {
            vault,
            env: Box::new(env),
        }
    }

    pub fn vault(&self) -> &Arc<Vault> {
        &self.vault
    }

    /// Resolve the password of a repository.
    ///
    /// Fails with [`BackvaultError::NotFound`] when no step has one, or
    /// [`BackvaultError::VaultLocked`] when the vault could not be consulted
    /// and the environment had nothing either.
    pub async fn resolve_repository_password(
        &self,
        repository_id: &RepositoryId,
        explicit: Option<&SecretString>,
    ) -> Result<Resolved<SecretString>, BackvaultError> {
        if let Some(password) = explicit {
            debug!(%repository_id, "repository password supplied explicitly");
            return Ok(Resolved::new(password.clone(), ResolvedFrom::Explicit));
        }

        let step = self.prepare_vault().await?;
        if matches!(step, VaultStep::Unlocked)
            && let Some(password) = self.vault.retrieve_repository_password(repository_id).await?
        {
            return Ok(Resolved::new(password, ResolvedFrom::Vault));
        }

        if let Some(password) = self.env.var(PASSWORD_ENV_VAR) {
            debug!(%repository_id, "repository password taken from environment");
            return Ok(Resolved::new(
                SecretString::from(password),
                ResolvedFrom::Environment,
            ));
        }

        Err(not_resolved(step, "repository password", repository_id))
    }

    /// Resolve one backend's credentials for a repository.
    ///
    /// An environment with only some of the backend's variables set is an
    /// [`BackvaultError::InvalidCredentials`] error naming the missing one.
    pub async fn resolve_backend_credentials(
        &self,
        repository_id: &RepositoryId,
        backend: BackendType,
        explicit: Option<&BackendCredentials>,
    ) -> Result<Resolved<BackendCredentials>, BackvaultError> {
        if let Some(credentials) = explicit {
            if credentials.backend_type() != backend {
                return Err(BackvaultError::Config(format!(
                    "explicit {} credentials supplied for a {backend} backend",
                    credentials.backend_type()
                )));
            }
            debug!(%repository_id, %backend, "backend credentials supplied explicitly");
            return Ok(Resolved::new(credentials.clone(), ResolvedFrom::Explicit));
        }

        let step = self.prepare_vault().await?;
        if matches!(step, VaultStep::Unlocked)
            && let Some(credentials) = self
                .vault
                .retrieve_backend_credentials(repository_id, backend)
                .await?
        {
            return Ok(Resolved::new(credentials, ResolvedFrom::Vault));
        }

        if let Some(credentials) = self.credentials_from_env(backend)? {
            debug!(%repository_id, %backend, "backend credentials taken from environment");
            return Ok(Resolved::new(credentials, ResolvedFrom::Environment));
        }

        Err(not_resolved(
            step,
            &format!("{backend} credentials"),
            repository_id,
        ))
    }

    /// Make sure the vault is unlocked if it can be, without prompting.
    ///
    /// Authentication, lockout and audit failures of the auto-unlock attempt
    /// propagate; auto-unlock being unavailable does not.
    async fn prepare_vault(&self) -> Result<VaultStep, BackvaultError> {
        match self.vault.status().await? {
            VaultStatus::Unlocked => return Ok(VaultStep::Unlocked),
            VaultStatus::Uninitialized => return Ok(VaultStep::Uninitialized),
            VaultStatus::Locked | VaultStatus::LockedOut { .. } => {}
        }
        if !self.vault.auto_unlock_permitted() {
            return Ok(VaultStep::Locked);
        }
        match self.vault.unlock(None).await {
            Ok(()) => Ok(VaultStep::Unlocked),
            Err(BackvaultError::AutoUnlockUnavailable(reason)) => {
                debug!(%reason, "auto-unlock unavailable, skipping vault");
                Ok(VaultStep::Locked)
            }
            Err(e) => Err(e),
        }
    }

    fn credentials_from_env(
        &self,
        backend: BackendType,
    ) -> Result<Option<BackendCredentials>, BackvaultError> {
        let pairs: BTreeMap<String, String> = credential_env_vars(backend)
            .iter()
            .filter_map(|(field, var)| self.env.var(var).map(|v| (field.to_string(), v)))
            .collect();
        if pairs.is_empty() {
            return Ok(None);
        }
        BackendCredentials::from_pairs(backend, &pairs).map(Some)
    }
}

fn not_resolved(step: VaultStep, what: &str, repository_id: &RepositoryId) -> BackvaultError {
    match step {
        VaultStep::Locked => BackvaultError::VaultLocked,
        VaultStep::Unlocked | VaultStep::Uninitialized => BackvaultError::NotFound {
            what: what.to_string(),
            repository_id: repository_id.to_string(),
        },
    }
}
