//! CLI for the qbwatch monitoring daemon.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use qbwatch_core::config;

use commands::{
    run_add, run_config, run_daemon, run_delete, run_force_start, run_pause, run_resume,
    run_status,
};

/// Top-level CLI for the qbwatch monitoring daemon.
#[derive(Debug, Parser)]
#[command(name = "qbwatch")]
#[command(about = "qbwatch: qBittorrent monitoring and admission control", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the watch daemon: poll, notify, and enforce the download limit.
    Run,

    /// Show the current torrent list and a transfer summary.
    Status,

    /// Fetch a .torrent file from a URL and add it to the remote instance.
    Add {
        /// URL of the .torrent file.
        url: String,
    },

    /// Pause a torrent by its hash.
    Pause {
        /// Torrent hash.
        hash: String,
    },

    /// Resume a torrent by its hash.
    Resume {
        /// Torrent hash.
        hash: String,
    },

    /// Delete a torrent by its hash.
    Delete {
        /// Torrent hash.
        hash: String,
        /// Also delete the downloaded files.
        #[arg(long)]
        delete_files: bool,
    },

    /// Force-start a torrent by its hash, bypassing queueing.
    ForceStart {
        /// Torrent hash.
        hash: String,
    },

    /// Print the config file location and the effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config for {}", cfg.server.base_url);

        match cli.command {
            CliCommand::Run => run_daemon(&cfg).await?,
            CliCommand::Status => run_status(&cfg).await?,
            CliCommand::Add { url } => run_add(&cfg, &url).await?,
            CliCommand::Pause { hash } => run_pause(&cfg, &hash).await?,
            CliCommand::Resume { hash } => run_resume(&cfg, &hash).await?,
            CliCommand::Delete { hash, delete_files } => {
                run_delete(&cfg, &hash, delete_files).await?;
            }
            CliCommand::ForceStart { hash } => run_force_start(&cfg, &hash).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}
