// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `backvault status` command implementation.
//!
//! Reports the vault state without unlocking it: uninitialized, locked,
//! locked out (with the time unlocking is allowed again) or unlocked.

use std::io::IsTerminal;

use backvault_core::BackvaultError;
use backvault_vault::{Vault, VaultStatus};
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: String,
    pub locked_until: Option<String>,
    pub vault_path: String,
    pub auto_unlock: bool,
}

impl StatusResponse {
    fn new(status: VaultStatus, vault: &Vault) -> Self {
        let (state, locked_until) = match status {
            VaultStatus::Uninitialized => ("uninitialized", None),
            VaultStatus::Locked => ("locked", None),
            VaultStatus::LockedOut { until } => ("locked_out", Some(until.to_rfc3339())),
            VaultStatus::Unlocked => ("unlocked", None),
        };
        Self {
            state: state.to_string(),
            locked_until,
            vault_path: vault.path().display().to_string(),
            auto_unlock: vault.auto_unlock_permitted(),
        }
    }
}

/// Run the `backvault status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(vault: &Vault, json: bool, plain: bool) -> Result<(), BackvaultError> {
    let status = vault.status().await?;
    let response = StatusResponse::new(status, vault);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
        return Ok(());
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    print_status(&response, use_color);
    Ok(())
}

fn print_status(response: &StatusResponse, use_color: bool) {
    println!();
    println!("  backvault status");
    println!("  {}", "-".repeat(35));

    let detail = match &response.locked_until {
        Some(until) => format!("{} (until {until})", response.state),
        None => response.state.clone(),
    };
    if use_color {
        use colored::Colorize;
        let styled = match response.state.as_str() {
            "unlocked" | "locked" => detail.green(),
            "locked_out" => detail.red(),
            _ => detail.yellow(),
        };
        println!("    State:       {styled}");
    } else {
        println!("    State:       {detail}");
    }

    println!("    Vault:       {}", response.vault_path);
    println!(
        "    Auto-unlock: {}",
        if response.auto_unlock { "permitted" } else { "disabled" }
    );
    if response.state == "uninitialized" {
        println!();
        println!("  Create with: backvault init");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use backvault_config::BackvaultConfig;
    use chrono::Utc;

    use super::*;

    fn vault(dir: &tempfile::TempDir) -> Vault {
        let mut config = BackvaultConfig::default();
        config.vault.path = dir.path().join("vault.json").display().to_string();
        config.audit.path = dir.path().join("audit.jsonl").display().to_string();
        Vault::open(&config).unwrap()
    }

    #[test]
    fn status_response_serializes() {
        let dir = tempfile::tempdir().unwrap();
        let resp = StatusResponse::new(VaultStatus::Locked, &vault(&dir));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"state\":\"locked\""));
        assert!(json.contains("\"locked_until\":null"));
    }

    #[test]
    fn locked_out_status_reports_until() {
        let dir = tempfile::tempdir().unwrap();
        let until = Utc::now();
        let resp = StatusResponse::new(VaultStatus::LockedOut { until }, &vault(&dir));
        assert_eq!(resp.state, "locked_out");
        assert_eq!(resp.locked_until, Some(until.to_rfc3339()));
    }
}
