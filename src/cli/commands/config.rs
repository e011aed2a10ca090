//! Config file location and defaults.

use std::path::{Path, PathBuf};

use crate::config::{self, Config, ConfigError};

fn target_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(config::config_path().ok_or(ConfigError::NoConfigDir)?),
    }
}

pub fn cmd_config_path(explicit: Option<&Path>) -> anyhow::Result<()> {
    let path = target_path(explicit)?;
    let state = if path.exists() { "exists" } else { "not created yet" };
    println!("{} ({})", path.display(), state);
    Ok(())
}

/// Write the default configuration, refusing to overwrite unless forced.
pub fn cmd_config_init(explicit: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = target_path(explicit)?;
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_to(&Config::default(), &path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
