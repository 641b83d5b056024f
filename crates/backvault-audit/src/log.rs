// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed, append-only audit log.
//!
//! One JSON object per line. Each append is written and flushed to disk
//! before [`AuditLog::append`] returns; a failed append surfaces as
//! [`BackvaultError::AuditWrite`] so the caller can abort the operation it
//! was auditing. Entries are never rewritten.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use backvault_core::BackvaultError;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::entry::{AuditEntry, AuditEventType, AuditSubject, Outcome};

/// Sequence number and hash the next appended entry chains onto.
#[derive(Debug, Default)]
struct ChainHead {
    next_sequence: u64,
    last_hash: Option<String>,
}

/// Result of [`AuditLog::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainReport {
    /// Every entry parsed and its hash matched its contents and predecessor.
    Intact { entries: u64 },
    /// The chain breaks at `line` (1-based): unparseable, out of sequence,
    /// or edited after the fact.
    Broken { line: usize, reason: String },
}

/// The append-only audit log.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    head: Mutex<ChainHead>,
}

impl AuditLog {
    /// Open (or create) the audit log at `path`, recovering the chain head
    /// from the last entry on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackvaultError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                BackvaultError::audit_write(
                    format!("cannot create audit directory {}", parent.display()),
                    e,
                )
            })?;
        }

        let head = if path.exists() {
            load_head(&path)?
        } else {
            ChainHead::default()
        };

        debug!(path = %path.display(), next_sequence = head.next_sequence, "audit log opened");
        Ok(Self {
            path,
            head: Mutex::new(head),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry and flush it to disk.
    ///
    /// On failure the bytes written by this call are truncated away, so the
    /// next append chains onto the last entry that was durably written.
    pub fn append(
        &self,
        event_type: AuditEventType,
        subject: AuditSubject,
        outcome: Outcome,
    ) -> Result<AuditEntry, BackvaultError> {
        let mut head = self
            .head
            .lock()
            .map_err(|_| BackvaultError::Internal("audit log mutex poisoned".to_string()))?;

        let entry = AuditEntry::chained(
            head.next_sequence,
            Utc::now(),
            event_type,
            subject,
            outcome,
            head.last_hash.clone(),
        );

        let mut line = serde_json::to_vec(&entry)
            .map_err(|e| BackvaultError::Internal(format!("audit entry serialization: {e}")))?;
        line.push(b'\n');

        let mut file = open_for_append(&self.path)
            .map_err(|e| BackvaultError::audit_write("cannot open audit log", e))?;
        let committed_len = file
            .metadata()
            .map_err(|e| BackvaultError::audit_write("cannot stat audit log", e))?
            .len();
        if let Err(e) = file.write_all(&line).and_then(|()| file.sync_data()) {
            self.discard_partial_append(&file, committed_len, &mut head);
            return Err(BackvaultError::audit_write("cannot append to audit log", e));
        }

        head.next_sequence += 1;
        head.last_hash = Some(entry.entry_hash.clone());

        debug!(
            sequence = entry.sequence,
            event = %entry.event_type,
            outcome = %entry.outcome,
            "audit entry appended"
        );
        Ok(entry)
    }

    /// Cut the file back to `committed_len` after a failed append. If that
    /// fails too, re-read the chain head from whatever is on disk.
    fn discard_partial_append(&self, file: &File, committed_len: u64, head: &mut ChainHead) {
        match file.set_len(committed_len).and_then(|()| file.sync_data()) {
            Ok(()) => warn!(committed_len, "discarded partially written audit entry"),
            Err(e) => {
                warn!(error = %e, "cannot truncate audit log, reloading chain head");
                match load_head(&self.path) {
                    Ok(reloaded) => *head = reloaded,
                    Err(e) => warn!(error = %e, "cannot reload audit chain head"),
                }
            }
        }
    }

    /// Every entry with `timestamp >= since`, in append order.
    pub fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<AuditEntry>, BackvaultError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|entry| entry.timestamp >= since)
            .collect())
    }

    /// Every readable entry, in append order.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>, BackvaultError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        read_entries(&self.path)
    }

    /// Recompute the hash chain over the whole file.
    pub fn verify(&self) -> Result<ChainReport, BackvaultError> {
        if !self.path.exists() {
            return Ok(ChainReport::Intact { entries: 0 });
        }

        let mut previous: Option<String> = None;
        let mut count = 0u64;
        for (index, line) in read_lines(&self.path)?.into_iter().enumerate() {
            let line_no = index + 1;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = match serde_json::from_str(&line) {
                Ok(entry) => entry,
                Err(e) => {
                    return Ok(ChainReport::Broken {
                        line: line_no,
                        reason: format!("unparseable entry: {e}"),
                    });
                }
            };
            let broken = |reason: &str| ChainReport::Broken {
                line: line_no,
                reason: reason.to_string(),
            };
            if entry.sequence != count {
                return Ok(broken("sequence gap"));
            }
            if entry.previous_hash != previous {
                return Ok(broken("previous hash does not match preceding entry"));
            }
            if entry.entry_hash != entry.expected_hash() {
                return Ok(broken("entry hash does not match contents"));
            }
            previous = Some(entry.entry_hash);
            count += 1;
        }

        Ok(ChainReport::Intact { entries: count })
    }
}

fn open_for_append(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn read_lines(path: &Path) -> Result<Vec<String>, BackvaultError> {
    let file = File::open(path).map_err(|e| {
        BackvaultError::persistence(format!("cannot read audit log {}", path.display()), e)
    })?;
    BufReader::new(file)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BackvaultError::persistence("cannot read audit log", e))
}

/// Chain head after the last readable entry of an existing log.
fn load_head(path: &Path) -> Result<ChainHead, BackvaultError> {
    terminate_torn_line(path)?;
    Ok(match read_entries(path)?.into_iter().last() {
        Some(last) => ChainHead {
            next_sequence: last.sequence + 1,
            last_hash: Some(last.entry_hash),
        },
        None => ChainHead::default(),
    })
}

/// Parse every entry, skipping lines that are not valid entries.
fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, BackvaultError> {
    let mut entries = Vec::new();
    for (index, line) in read_lines(path)?.into_iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line = index + 1, error = %e, "skipping unreadable audit entry"),
        }
    }
    Ok(entries)
}

/// A crash mid-append can leave a final line without its newline. Terminate it
/// so the next entry starts on a line of its own.
fn terminate_torn_line(path: &Path) -> Result<(), BackvaultError> {
    let content = std::fs::read(path)
        .map_err(|e| BackvaultError::persistence("cannot read audit log", e))?;
    if content.last().is_some_and(|&b| b != b'\n') {
        warn!(path = %path.display(), "audit log ends with a partial entry");
        let mut file = open_for_append(path)
            .map_err(|e| BackvaultError::audit_write("cannot open audit log", e))?;
        file.write_all(b"\n")
            .and_then(|()| file.sync_data())
            .map_err(|e| BackvaultError::audit_write("cannot repair audit log", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use backvault_core::{BackendType, RepositoryId};
    use tempfile::tempdir;

    use super::*;

    fn repo() -> RepositoryId {
        RepositoryId::from_location("s3://bucket/repo")
    }

    #[test]
    fn append_then_read_back_in_order() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();

        log.append(AuditEventType::Unlock, AuditSubject::vault(), Outcome::Success)
            .unwrap();
        log.append(
            AuditEventType::SecretStored,
            AuditSubject::repository_password(&repo()),
            Outcome::Success,
        )
        .unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sequence, 0);
        assert_eq!(entries[0].previous_hash, None);
        assert_eq!(entries[1].sequence, 1);
        assert_eq!(entries[1].previous_hash.as_deref(), Some(entries[0].entry_hash.as_str()));
        assert_eq!(log.verify().unwrap(), ChainReport::Intact { entries: 2 });
    }

    #[test]
    fn reopen_continues_the_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let first = {
            let log = AuditLog::open(&path).unwrap();
            log.append(AuditEventType::Unlock, AuditSubject::vault(), Outcome::Success)
                .unwrap()
        };

        let log = AuditLog::open(&path).unwrap();
        let second = log
            .append(AuditEventType::Lock, AuditSubject::vault(), Outcome::Success)
            .unwrap();

        assert_eq!(second.sequence, 1);
        assert_eq!(second.previous_hash, Some(first.entry_hash));
        assert_eq!(log.verify().unwrap(), ChainReport::Intact { entries: 2 });
    }

    #[test]
    fn read_since_filters_by_timestamp() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();

        log.append(AuditEventType::Unlock, AuditSubject::vault(), Outcome::Success)
            .unwrap();
        let cutoff = Utc::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        log.append(
            AuditEventType::SecretRetrieved,
            AuditSubject::backend_credentials(&repo(), BackendType::B2),
            Outcome::Success,
        )
        .unwrap();

        let recent = log.read_since(cutoff).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].event_type, AuditEventType::SecretRetrieved);
        assert_eq!(recent[0].subject.backend_type, Some(BackendType::B2));
    }

    #[test]
    fn edited_entry_breaks_the_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::open(&path).unwrap();

        log.append(AuditEventType::UnlockFailed, AuditSubject::vault(), Outcome::Failure)
            .unwrap();
        log.append(AuditEventType::Unlock, AuditSubject::vault(), Outcome::Success)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let edited = content.replacen("\"failure\"", "\"success\"", 1);
        std::fs::write(&path, edited).unwrap();

        match log.verify().unwrap() {
            ChainReport::Broken { line, reason } => {
                assert_eq!(line, 1);
                assert!(reason.contains("hash"), "{reason}");
            }
            other => panic!("expected broken chain, got {other:?}"),
        }
    }

    #[test]
    fn deleted_entry_breaks_the_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::open(&path).unwrap();
        for _ in 0..3 {
            log.append(AuditEventType::Lock, AuditSubject::vault(), Outcome::Success)
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let without_middle: Vec<&str> = content
            .lines()
            .enumerate()
            .filter(|(i, _)| *i != 1)
            .map(|(_, l)| l)
            .collect();
        std::fs::write(&path, without_middle.join("\n") + "\n").unwrap();

        assert!(matches!(log.verify().unwrap(), ChainReport::Broken { line: 2, .. }));
    }

    #[test]
    fn torn_trailing_line_is_isolated_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let log = AuditLog::open(&path).unwrap();
            log.append(AuditEventType::Unlock, AuditSubject::vault(), Outcome::Success)
                .unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"sequence\":1,\"timest").unwrap();
        drop(file);

        let log = AuditLog::open(&path).unwrap();
        let entry = log
            .append(AuditEventType::Lock, AuditSubject::vault(), Outcome::Success)
            .unwrap();
        assert_eq!(entry.sequence, 1);
        assert_eq!(log.read_all().unwrap().len(), 2);
    }

    #[test]
    fn failed_append_is_truncated_away() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::open(&path).unwrap();
        log.append(AuditEventType::Unlock, AuditSubject::vault(), Outcome::Success)
            .unwrap();
        let committed_len = std::fs::metadata(&path).unwrap().len();

        // Bytes left behind by a write that failed before completing.
        let mut file = open_for_append(&path).unwrap();
        file.write_all(b"{\"sequence\":1,\"timest").unwrap();
        {
            let mut head = log.head.lock().unwrap();
            log.discard_partial_append(&file, committed_len, &mut head);
        }
        drop(file);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), committed_len);

        let entry = log
            .append(AuditEventType::Lock, AuditSubject::vault(), Outcome::Success)
            .unwrap();
        assert_eq!(entry.sequence, 1);
        assert_eq!(log.verify().unwrap(), ChainReport::Intact { entries: 2 });
    }

    #[test]
    fn untruncatable_append_reloads_the_chain_head() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::open(&path).unwrap();
        let first = log
            .append(AuditEventType::Unlock, AuditSubject::vault(), Outcome::Success)
            .unwrap();
        let committed_len = std::fs::metadata(&path).unwrap().len();

        // A complete entry whose fsync reported failure.
        let written = AuditEntry::chained(
            1,
            Utc::now(),
            AuditEventType::SecretStored,
            AuditSubject::repository_password(&repo()),
            Outcome::Success,
            Some(first.entry_hash.clone()),
        );
        let mut line = serde_json::to_vec(&written).unwrap();
        line.push(b'\n');
        open_for_append(&path).unwrap().write_all(&line).unwrap();

        // A read-only handle cannot be truncated.
        let read_only = File::open(&path).unwrap();
        {
            let mut head = log.head.lock().unwrap();
            log.discard_partial_append(&read_only, committed_len, &mut head);
        }

        let next = log
            .append(AuditEventType::Lock, AuditSubject::vault(), Outcome::Success)
            .unwrap();
        assert_eq!(next.sequence, 2);
        assert_eq!(next.previous_hash, Some(written.entry_hash));
        assert_eq!(log.verify().unwrap(), ChainReport::Intact { entries: 3 });
    }

    #[test]
    fn append_fails_when_log_cannot_be_written() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();
        // Replace the log path with a directory so opening it for append fails.
        std::fs::create_dir(dir.path().join("audit.jsonl")).unwrap();

        let err = log
            .append(AuditEventType::Unlock, AuditSubject::vault(), Outcome::Success)
            .unwrap_err();
        assert!(matches!(err, BackvaultError::AuditWrite { .. }));
    }
}
