// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Backvault secret vault.
//!
//! Holds the error type and the domain types shared by the vault, the audit
//! log, and the operator CLI.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BackvaultError;
pub use types::{BackendType, RepositoryId, SecretKind};
