//! CLI for the MDM mod download manager.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use mdm_core::config;
use mdm_core::recovery_db::RecoveryDb;

use commands::{run_completions, run_config, run_remove, run_roots, run_status};

/// Top-level CLI for the MDM mod download manager.
#[derive(Debug, Parser)]
#[command(name = "mdm")]
#[command(about = "MDM: mod download and install manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// List in-flight jobs recorded in the recovery database.
    Status,

    /// Delete a stale recovery entry by job key.
    Remove {
        /// Job key as shown by `mdm status`.
        key: String,
    },

    /// Check every configured install root.
    Roots,

    /// Print the config path and effective settings.
    Config,

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Status => run_status(&RecoveryDb::open_default().await?).await?,
            CliCommand::Remove { key } => {
                run_remove(&RecoveryDb::open_default().await?, &key).await?
            }
            CliCommand::Roots => run_roots(&cfg).await?,
            CliCommand::Config => run_config(&cfg, &config::config_path()?)?,
            CliCommand::Completions { shell } => run_completions(shell),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
