//! CLI command definitions and dispatch.
//!
//! Each subcommand group lives in its own submodule:
//! - `play`: the playback loop and the interactive session chooser
//! - `scan`: preview of the ordered local queue
//! - `sessions`: listing and cleaning saved sessions
//! - `cache`: metadata cache maintenance
//! - `config`: config file location and defaults

mod cache;
mod config;
mod play;
mod scan;
mod sessions;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

pub use cache::{cmd_cache_purge, cmd_cache_stats};
pub use config::{cmd_config_init, cmd_config_path};
pub use play::{PlayOptions, cmd_play};
pub use scan::cmd_scan;
pub use sessions::{cmd_sessions_clean, cmd_sessions_delete, cmd_sessions_list};

use crate::config::Config;

/// Local-first music queue with background enrichment of remote playlists
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "PLAYSTREAM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Build the queue and start playing (default)
    Play {
        /// Ignore saved sessions and fetch a fresh catalog listing
        #[arg(long, conflicts_with = "resume_latest")]
        fresh: bool,
        /// Resume the most recently used session without asking
        #[arg(long)]
        resume_latest: bool,
        /// Announce items instead of launching the player
        #[arg(long)]
        dry_run: bool,
    },
    /// Scan the library tiers and print the ordered local queue
    Scan {
        /// Maximum number of items to print
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Manage saved sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Manage the metadata cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List saved sessions, most recently used first
    List,
    /// Delete old sessions
    Clean {
        /// Delete sessions unused for this many days
        #[arg(long)]
        max_age_days: Option<u32>,
        /// Always keep this many recent sessions
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Delete one session by id
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show cache location and entry count
    Stats,
    /// Remove entries older than the retention period
    Purge,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file path
    Path,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the specified CLI command, or `play` when none is given.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let config = load_config(cli);

    match &cli.command {
        None => cmd_play(&rt, &config, PlayOptions::default()),
        Some(Commands::Play {
            fresh,
            resume_latest,
            dry_run,
        }) => cmd_play(
            &rt,
            &config,
            PlayOptions {
                fresh: *fresh,
                resume_latest: *resume_latest,
                dry_run: *dry_run,
            },
        ),
        Some(Commands::Scan { limit }) => cmd_scan(&rt, &config, *limit),
        Some(Commands::Sessions { action }) => match action {
            SessionsAction::List => cmd_sessions_list(&config),
            SessionsAction::Clean { max_age_days, keep } => {
                cmd_sessions_clean(&config, *max_age_days, *keep)
            }
            SessionsAction::Delete { id } => cmd_sessions_delete(&config, id),
        },
        Some(Commands::Cache { action }) => match action {
            CacheAction::Stats => cmd_cache_stats(&rt, &config),
            CacheAction::Purge => cmd_cache_purge(&rt, &config),
        },
        Some(Commands::Config { action }) => match action {
            ConfigAction::Path => cmd_config_path(cli.config.as_deref()),
            ConfigAction::Init { force } => cmd_config_init(cli.config.as_deref(), *force),
        },
    }
}

fn load_config(cli: &Cli) -> Config {
    match &cli.config {
        Some(path) => crate::config::load_from(path),
        None => crate::config::load(),
    }
}
