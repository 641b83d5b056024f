// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key management commands: init, change-passphrase, auto-unlock.

use backvault_core::BackvaultError;
use backvault_vault::{Vault, VaultStatus};

use crate::{AutoUnlockAction, unlock_interactive};

pub async fn run_init(vault: &Vault, auto_unlock: bool) -> Result<(), BackvaultError> {
    if vault.status().await? != VaultStatus::Uninitialized {
        return Err(BackvaultError::Config(format!(
            "a vault already exists at {}",
            vault.path().display()
        )));
    }
    let passphrase = backvault_vault::read_new_passphrase()?;
    vault.unlock(Some(&passphrase)).await?;
    if auto_unlock {
        vault.enable_auto_unlock().await?;
    }
    println!("vault created at {}", vault.path().display());
    if auto_unlock && !vault.auto_unlock_permitted() {
        println!("note: set vault.auto_unlock = true to allow unattended unlock");
    }
    Ok(())
}

pub async fn run_change_passphrase(vault: &Vault) -> Result<(), BackvaultError> {
    unlock_interactive(vault).await?;
    let passphrase = backvault_vault::read_new_passphrase()?;
    vault.change_passphrase(&passphrase).await?;
    println!("passphrase changed");
    Ok(())
}

pub async fn run_auto_unlock(vault: &Vault, action: AutoUnlockAction) -> Result<(), BackvaultError> {
    unlock_interactive(vault).await?;
    match action {
        AutoUnlockAction::Enable => {
            vault.enable_auto_unlock().await?;
            println!("host key slot added");
            if !vault.auto_unlock_permitted() {
                println!("note: set vault.auto_unlock = true to allow unattended unlock");
            }
        }
        AutoUnlockAction::Disable => {
            if vault.disable_auto_unlock().await? {
                println!("host key slot removed");
            } else {
                println!("vault has no host key slot");
            }
        }
    }
    Ok(())
}
