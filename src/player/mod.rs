//! Playback through an external media player process.
//!
//! Each item is handed to the configured program (mpv by default) as a
//! single argument after the configured flags. Playback of one item ends
//! when the process exits.

use std::process::ExitStatus;
use tokio::process::Command;

use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::model::QueueItem;

/// External player invocation.
#[derive(Debug, Clone)]
pub struct Player {
    program: String,
    args: Vec<String>,
}

impl Player {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    fn command(&self, locator: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(locator).kill_on_drop(true);
        command
    }

    /// Play one item and wait for the player to exit.
    ///
    /// The child is killed if the returned future is dropped.
    pub async fn play(&self, item: &QueueItem) -> Result<()> {
        tracing::info!(target: "player", locator = %item.locator, "Playing {}", item.display_title());

        let status = self
            .command(&item.locator)
            .status()
            .await
            .map_err(|e| Error::playback(format!("failed to start {}: {}", self.program, e)))?;

        check_status(&self.program, status)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::from_config(&PlayerConfig::default())
    }
}

fn check_status(program: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(Error::playback(format!("{} exited with status {}", program, code))),
        None => Err(Error::playback(format!("{} was terminated by a signal", program))),
    }
}
