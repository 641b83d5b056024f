// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tamper-evident audit trail for the Backvault secret vault.
//!
//! Every unlock, lock, failed unlock, lockout, store, retrieve and remove is
//! appended as a JSON line. Each entry carries the SHA-256 of its predecessor,
//! so editing or deleting a line is detected by [`AuditLog::verify`].
//! Entries hold repository ids and backend types, never secret values.

pub mod entry;
pub mod log;

pub use entry::{AuditEntry, AuditEventType, AuditSubject, Outcome};
pub use log::{AuditLog, ChainReport};
