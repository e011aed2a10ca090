//! playstream - local-first music queue with background enrichment.
//!
//! Local files from prioritized library tiers play first. Meanwhile a
//! remote catalog listing is loaded into a resumable session and a small
//! worker pool resolves metadata for it ahead of playback.

pub mod cache;
pub mod cli;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod model;
pub mod player;
pub mod queue;
pub mod scanner;
pub mod session;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Subsystem targets ("queue", "session", ...) sit outside the crate path
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run_command(&args)
}
