// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret commands: set, remove, check, list and resolve.

use std::collections::BTreeMap;
use std::io::{BufRead, IsTerminal};
use std::sync::Arc;

use backvault_core::{BackendType, BackvaultError, RepositoryId};
use backvault_vault::{BackendCredentials, EntrySummary, ResolutionEngine, Vault, mask_secret};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use zeroize::Zeroizing;

use crate::unlock_interactive;

/// Read one secret value: hidden prompt on a TTY, otherwise a line of stdin.
fn read_value(label: &str) -> Result<Zeroizing<String>, BackvaultError> {
    let value = if std::io::stdin().is_terminal() {
        eprint!("{label}: ");
        rpassword::read_password()
            .map_err(|e| BackvaultError::Input(format!("failed to read {label}: {e}")))?
    } else {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| BackvaultError::Input(format!("failed to read {label}: {e}")))?;
        line.trim_end_matches(['\r', '\n']).to_string()
    };
    if value.is_empty() {
        return Err(BackvaultError::Input(format!("empty {label} not allowed")));
    }
    Ok(Zeroizing::new(value))
}

/// Split `--field` arguments into pairs, prompting for bare keys.
fn parse_fields(fields: &[String]) -> Result<BTreeMap<String, String>, BackvaultError> {
    let mut pairs = BTreeMap::new();
    for field in fields {
        let (key, value) = match field.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.to_string()),
            None => {
                let key = field.trim().to_string();
                let value = read_value(&key)?;
                (key, value.to_string())
            }
        };
        if key.is_empty() {
            return Err(BackvaultError::Input(format!("invalid field `{field}`")));
        }
        pairs.insert(key, value);
    }
    Ok(pairs)
}

pub async fn run_set_password(vault: &Vault, repository_id: &RepositoryId) -> Result<(), BackvaultError> {
    unlock_interactive(vault).await?;
    let value = read_value("repository password")?;
    vault
        .store_repository_password(repository_id, &SecretString::from(value.to_string()))
        .await?;
    println!("stored repository password for {repository_id}");
    Ok(())
}

pub async fn run_set_credentials(
    vault: &Vault,
    repository_id: &RepositoryId,
    backend: BackendType,
    fields: &[String],
) -> Result<(), BackvaultError> {
    let mut pairs = parse_fields(fields)?;
    let credentials = BackendCredentials::from_pairs(backend, &pairs);
    pairs.values_mut().for_each(zeroize::Zeroize::zeroize);
    let credentials = credentials?;

    unlock_interactive(vault).await?;
    vault
        .store_backend_credentials(repository_id, credentials)
        .await?;
    println!("stored {backend} credentials for {repository_id}");
    Ok(())
}

pub async fn run_remove_password(
    vault: &Vault,
    repository_id: &RepositoryId,
) -> Result<(), BackvaultError> {
    unlock_interactive(vault).await?;
    if vault.remove_repository_password(repository_id).await? {
        println!("removed repository password for {repository_id}");
    } else {
        println!("no repository password stored for {repository_id}");
    }
    Ok(())
}

pub async fn run_remove_credentials(
    vault: &Vault,
    repository_id: &RepositoryId,
    backend: BackendType,
) -> Result<(), BackvaultError> {
    unlock_interactive(vault).await?;
    if vault.remove_backend_credentials(repository_id, backend).await? {
        println!("removed {backend} credentials for {repository_id}");
    } else {
        println!("no {backend} credentials stored for {repository_id}");
    }
    Ok(())
}

pub async fn run_has_credentials(
    vault: &Vault,
    repository_id: &RepositoryId,
    backend: BackendType,
) -> Result<bool, BackvaultError> {
    unlock_interactive(vault).await?;
    let present = vault.has_backend_credentials(repository_id, backend).await?;
    println!("{}", if present { "yes" } else { "no" });
    Ok(present)
}

/// One row of `backvault list --json`.
#[derive(Debug, Serialize)]
pub struct EntryRow {
    pub repository_id: String,
    pub kind: String,
    pub created_at: String,
    pub last_accessed: Option<String>,
    pub access_count: u64,
}

impl From<&EntrySummary> for EntryRow {
    fn from(entry: &EntrySummary) -> Self {
        Self {
            repository_id: entry.repository_id.to_string(),
            kind: entry
                .backend_type
                .map(|b| b.to_string())
                .unwrap_or_else(|| "password".to_string()),
            created_at: entry.meta.created_at.to_rfc3339(),
            last_accessed: entry.meta.last_accessed.map(|t| t.to_rfc3339()),
            access_count: entry.meta.access_count,
        }
    }
}

pub async fn run_list(vault: &Vault, json: bool) -> Result<(), BackvaultError> {
    unlock_interactive(vault).await?;
    let rows: Vec<EntryRow> = vault.list_entries().await?.iter().map(EntryRow::from).collect();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
        );
        return Ok(());
    }
    if rows.is_empty() {
        println!("vault is empty");
        return Ok(());
    }
    println!(
        "{:<32}  {:<8}  {:>6}  LAST ACCESSED",
        "REPOSITORY", "KIND", "COUNT"
    );
    for row in rows {
        println!(
            "{:<32}  {:<8}  {:>6}  {}",
            row.repository_id,
            row.kind,
            row.access_count,
            row.last_accessed.as_deref().unwrap_or("never")
        );
    }
    Ok(())
}

/// Resolve like a backend adapter and print the result masked.
pub async fn run_resolve(
    vault: Vault,
    repository_id: &RepositoryId,
    backend: Option<BackendType>,
) -> Result<(), BackvaultError> {
    let vault = Arc::new(vault);
    if !vault.is_unlocked().await? && let Some(secret) = backvault_vault::read_passphrase()? {
        vault.unlock(Some(&secret)).await?;
    }
    let engine = ResolutionEngine::new(vault);

    match backend {
        None => {
            let resolved = engine.resolve_repository_password(repository_id, None).await?;
            println!("source:   {}", resolved.from);
            println!("password: {}", mask_secret(resolved.value.expose_secret()));
        }
        Some(backend) => {
            let resolved = engine
                .resolve_backend_credentials(repository_id, backend, None)
                .await?;
            println!("source:  {}", resolved.from);
            println!("backend: {backend}");
            for (field, value) in resolved.value.fields() {
                println!("  {field}: {}", mask_secret(value));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use backvault_core::RepositoryId;
    use backvault_vault::AccessMetadata;
    use chrono::Utc;

    use super::*;

    #[test]
    fn parse_fields_splits_on_first_equals() {
        let pairs = parse_fields(&[
            "access_key_id=AK".to_string(),
            "secret_access_key=a=b".to_string(),
        ])
        .unwrap();
        assert_eq!(pairs["access_key_id"], "AK");
        assert_eq!(pairs["secret_access_key"], "a=b");
    }

    #[test]
    fn parse_fields_rejects_empty_key() {
        assert!(matches!(
            parse_fields(&["=value".to_string()]),
            Err(BackvaultError::Input(_))
        ));
    }

    #[test]
    fn entry_row_labels_passwords() {
        let summary = EntrySummary {
            repository_id: RepositoryId::from_location("/srv/restic"),
            backend_type: None,
            meta: AccessMetadata {
                created_at: Utc::now(),
                last_accessed: None,
                access_count: 0,
            },
        };
        let row = EntryRow::from(&summary);
        assert_eq!(row.kind, "password");
        assert!(row.last_accessed.is_none());

        let summary = EntrySummary {
            backend_type: Some(BackendType::B2),
            ..summary
        };
        assert_eq!(EntryRow::from(&summary).kind, "b2");
    }
}
