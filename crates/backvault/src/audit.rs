// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `backvault audit` command implementation.

use backvault_audit::{AuditEntry, ChainReport};
use backvault_core::BackvaultError;
use backvault_vault::Vault;
use chrono::{DateTime, Utc};

/// List entries, or verify the chain. Returns the exit code: 0, or 2 when
/// verification found a broken chain.
pub fn run_audit(
    vault: &Vault,
    since: Option<DateTime<Utc>>,
    verify: bool,
    json: bool,
) -> Result<i32, BackvaultError> {
    if verify {
        return match vault.verify_audit()? {
            ChainReport::Intact { entries } => {
                println!("audit chain intact ({entries} entries)");
                Ok(0)
            }
            ChainReport::Broken { line, reason } => {
                println!("audit chain broken at line {line}: {reason}");
                Ok(2)
            }
        };
    }

    let entries = vault.audit_since(since.unwrap_or(DateTime::<Utc>::MIN_UTC))?;
    for entry in &entries {
        if json {
            println!("{}", serde_json::to_string(entry).unwrap_or_default());
        } else {
            println!("{}", format_entry(entry));
        }
    }
    Ok(0)
}

fn format_entry(entry: &AuditEntry) -> String {
    let mut line = format!(
        "{:>6}  {}  {:<18} {:<7}",
        entry.sequence,
        entry.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        entry.event_type.to_string(),
        entry.outcome.to_string(),
    );
    if let Some(id) = &entry.subject.repository_id {
        line.push_str(&format!(" repo={id}"));
    }
    if let Some(backend) = entry.subject.backend_type {
        line.push_str(&format!(" backend={backend}"));
    }
    line.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use backvault_audit::{AuditEventType, AuditLog, AuditSubject, Outcome};
    use backvault_core::{BackendType, RepositoryId};

    use super::*;

    #[test]
    fn format_entry_shows_subject_but_no_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();
        let id = RepositoryId::from_location("s3://bucket/repo");
        let entry = log
            .append(
                AuditEventType::SecretRetrieved,
                AuditSubject::backend_credentials(&id, BackendType::S3),
                Outcome::Success,
            )
            .unwrap();

        let line = format_entry(&entry);
        assert!(line.contains("secret_retrieved"));
        assert!(line.contains(&format!("repo={id}")));
        assert!(line.contains("backend=s3"));
        assert!(!line.contains(&entry.entry_hash));
    }
}
