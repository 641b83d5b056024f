// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master secret acquisition via TTY prompt or BACKVAULT_PASSPHRASE environment variable.

use backvault_core::BackvaultError;
use secrecy::SecretString;

/// The environment variable name for providing the master secret.
pub const PASSPHRASE_ENV_VAR: &str = "BACKVAULT_PASSPHRASE";

/// Get the master secret from the environment or an interactive TTY prompt.
///
/// Priority:
/// 1. `BACKVAULT_PASSPHRASE` environment variable (cron, systemd timers)
/// 2. Interactive TTY prompt via `rpassword`
///
/// Returns `Ok(None)` when neither is available, so callers can fall back to
/// auto-unlock.
pub fn read_passphrase() -> Result<Option<SecretString>, BackvaultError> {
    if let Some(secret) = passphrase_from_env() {
        return Ok(Some(secret));
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        let passphrase = prompt("Vault passphrase: ")?;
        if passphrase.is_empty() {
            return Err(BackvaultError::Input("empty passphrase not allowed".to_string()));
        }
        return Ok(Some(SecretString::from(passphrase)));
    }

    Ok(None)
}

/// Get a new master secret, prompting twice on a TTY.
///
/// The environment variable is taken as-is without confirmation.
pub fn read_new_passphrase() -> Result<SecretString, BackvaultError> {
    if let Some(secret) = passphrase_from_env() {
        return Ok(secret);
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        let pass1 = zeroize::Zeroizing::new(prompt("New vault passphrase: ")?);
        let pass2 = zeroize::Zeroizing::new(prompt("Confirm vault passphrase: ")?);

        if *pass1 != *pass2 {
            return Err(BackvaultError::Input("passphrases do not match".to_string()));
        }
        if pass1.is_empty() {
            return Err(BackvaultError::Input("empty passphrase not allowed".to_string()));
        }
        return Ok(SecretString::from(pass1.to_string()));
    }

    Err(BackvaultError::Input(format!(
        "no passphrase provided; set {PASSPHRASE_ENV_VAR} or run interactively"
    )))
}

fn passphrase_from_env() -> Option<SecretString> {
    std::env::var(PASSPHRASE_ENV_VAR)
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::from)
}

fn prompt(label: &str) -> Result<String, BackvaultError> {
    eprint!("{label}");
    rpassword::read_password()
        .map_err(|e| BackvaultError::Input(format!("failed to read passphrase: {e}")))
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn passphrase_from_env_var() {
        // SAFETY: test-only env mutation, serialized with other env tests.
        unsafe { std::env::set_var(PASSPHRASE_ENV_VAR, "test-passphrase") };
        let result = read_passphrase();
        unsafe { std::env::remove_var(PASSPHRASE_ENV_VAR) };

        assert_eq!(result.unwrap().unwrap().expose_secret(), "test-passphrase");
    }

    #[test]
    #[serial]
    fn new_passphrase_from_env_var_skips_confirmation() {
        unsafe { std::env::set_var(PASSPHRASE_ENV_VAR, "test-passphrase") };
        let result = read_new_passphrase();
        unsafe { std::env::remove_var(PASSPHRASE_ENV_VAR) };

        assert_eq!(result.unwrap().expose_secret(), "test-passphrase");
    }

    #[test]
    #[serial]
    fn new_passphrase_without_env_or_tty_is_an_input_error() {
        if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
            return;
        }
        unsafe { std::env::remove_var(PASSPHRASE_ENV_VAR) };
        let err = read_new_passphrase().unwrap_err();
        assert!(matches!(err, BackvaultError::Input(_)));
        assert!(err.to_string().contains(PASSPHRASE_ENV_VAR));
    }

    #[test]
    #[serial]
    fn empty_env_var_is_ignored() {
        unsafe { std::env::set_var(PASSPHRASE_ENV_VAR, "") };
        let from_env = passphrase_from_env();
        unsafe { std::env::remove_var(PASSPHRASE_ENV_VAR) };

        assert!(from_env.is_none());
    }
}
