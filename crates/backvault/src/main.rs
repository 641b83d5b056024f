// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backvault - local secret vault for backup repositories.
//!
//! This is the binary entry point: operator commands for storing, inspecting
//! and resolving repository passwords and backend credentials.

mod audit;
mod keys;
mod secrets;
mod status;

use std::path::PathBuf;

use backvault_config::BackvaultConfig;
use backvault_core::{BackendType, BackvaultError, RepositoryId};
use backvault_vault::Vault;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

/// Backvault - local secret vault for backup repositories.
#[derive(Parser, Debug)]
#[command(name = "backvault", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// A repository, by location or by id.
#[derive(Args, Debug, Clone)]
pub struct RepositoryArg {
    /// Repository location (e.g. `s3:https://host/bucket/path`).
    repository: String,

    /// Treat REPOSITORY as a 32-character repository id instead of a location.
    #[arg(long)]
    id: bool,
}

impl RepositoryArg {
    pub fn repository_id(&self) -> Result<RepositoryId, BackvaultError> {
        if self.id {
            RepositoryId::parse(&self.repository).ok_or_else(|| {
                BackvaultError::Input(format!(
                    "`{}` is not a repository id (32 lowercase hex characters)",
                    self.repository
                ))
            })
        } else {
            Ok(RepositoryId::from_location(&self.repository))
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the vault and set its master passphrase.
    Init {
        /// Also add a host key slot for unattended unlock.
        #[arg(long)]
        auto_unlock: bool,
    },
    /// Show the vault state.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Store a repository password (prompted, or read from stdin).
    SetPassword {
        #[command(flatten)]
        repository: RepositoryArg,
    },
    /// Store backend credentials for a repository.
    SetCredentials {
        #[command(flatten)]
        repository: RepositoryArg,
        /// Backend type (s3, b2).
        #[arg(long)]
        backend: BackendType,
        /// Credential field as KEY=VALUE, or KEY alone to be prompted.
        #[arg(long = "field", value_name = "KEY[=VALUE]", required = true)]
        fields: Vec<String>,
    },
    /// Remove a repository password.
    RemovePassword {
        #[command(flatten)]
        repository: RepositoryArg,
    },
    /// Remove backend credentials for a repository.
    RemoveCredentials {
        #[command(flatten)]
        repository: RepositoryArg,
        #[arg(long)]
        backend: BackendType,
    },
    /// Check whether backend credentials are stored (exit code 0 when they are).
    HasCredentials {
        #[command(flatten)]
        repository: RepositoryArg,
        #[arg(long)]
        backend: BackendType,
    },
    /// List stored secrets (metadata only).
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Resolve a credential the way a backend adapter would, with masked output.
    Resolve {
        #[command(flatten)]
        repository: RepositoryArg,
        /// Resolve backend credentials instead of the repository password.
        #[arg(long)]
        backend: Option<BackendType>,
    },
    /// Change the master passphrase.
    ChangePassphrase,
    /// Manage the host key slot used for unattended unlock.
    AutoUnlock {
        #[command(subcommand)]
        action: AutoUnlockAction,
    },
    /// Show or verify the audit trail.
    Audit {
        /// Only entries at or after this RFC 3339 timestamp.
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        /// Verify the hash chain instead of listing entries.
        #[arg(long)]
        verify: bool,
        /// Output as JSON lines.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum AutoUnlockAction {
    /// Add a host key slot for this machine and user.
    Enable,
    /// Remove the host key slot.
    Disable,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => backvault_config::load_and_validate_path(path),
        None => backvault_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            backvault_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    match run(cli.command, &config).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("backvault: {e}");
            std::process::exit(error_exit_code(&e));
        }
    }
}

/// Exit code for a failed command: 3 when nothing is configured for the
/// request, 1 for every other error.
fn error_exit_code(error: &BackvaultError) -> i32 {
    if error.is_recoverable() { 3 } else { 1 }
}

/// Dispatch a command. Returns the process exit code.
async fn run(command: Commands, config: &BackvaultConfig) -> Result<i32, BackvaultError> {
    let vault = Vault::open(config)?;
    tracing::debug!(path = %vault.path().display(), "vault opened");

    match command {
        Commands::Init { auto_unlock } => keys::run_init(&vault, auto_unlock).await?,
        Commands::Status { json, plain } => status::run_status(&vault, json, plain).await?,
        Commands::SetPassword { repository } => {
            secrets::run_set_password(&vault, &repository.repository_id()?).await?
        }
        Commands::SetCredentials {
            repository,
            backend,
            fields,
        } => {
            secrets::run_set_credentials(&vault, &repository.repository_id()?, backend, &fields)
                .await?
        }
        Commands::RemovePassword { repository } => {
            secrets::run_remove_password(&vault, &repository.repository_id()?).await?
        }
        Commands::RemoveCredentials {
            repository,
            backend,
        } => secrets::run_remove_credentials(&vault, &repository.repository_id()?, backend).await?,
        Commands::HasCredentials {
            repository,
            backend,
        } => {
            let present =
                secrets::run_has_credentials(&vault, &repository.repository_id()?, backend).await?;
            return Ok(if present { 0 } else { 1 });
        }
        Commands::List { json } => secrets::run_list(&vault, json).await?,
        Commands::Resolve {
            repository,
            backend,
        } => secrets::run_resolve(vault, &repository.repository_id()?, backend).await?,
        Commands::ChangePassphrase => keys::run_change_passphrase(&vault).await?,
        Commands::AutoUnlock { action } => keys::run_auto_unlock(&vault, action).await?,
        Commands::Audit {
            since,
            verify,
            json,
        } => return audit::run_audit(&vault, since, verify, json),
    }
    Ok(0)
}

/// Unlock with `BACKVAULT_PASSPHRASE` or a prompt, falling back to auto-unlock.
pub async fn unlock_interactive(vault: &Vault) -> Result<(), BackvaultError> {
    let secret = backvault_vault::read_passphrase()?;
    vault.unlock(secret.as_ref()).await
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("backvault={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
