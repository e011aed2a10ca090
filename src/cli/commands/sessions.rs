//! Saved session maintenance.

use crate::config::Config;
use crate::session::SessionStore;

fn open_store(config: &Config) -> anyhow::Result<SessionStore> {
    Ok(SessionStore::open(config.sessions.resolved_dir())?)
}

pub fn cmd_sessions_list(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let sessions = store.list_sessions();
    if sessions.is_empty() {
        println!("No saved sessions in {}", store.dir().display());
        return Ok(());
    }

    for session in &sessions {
        println!("{}", session.summary());
        println!("    created {:.1}h ago, played {} items", session.age_hours(), session.play_count);
        if let Some(locator) = &session.current_locator {
            println!("    last played: {}", locator);
        }
    }
    Ok(())
}

/// Delete old sessions, falling back to the configured retention.
pub fn cmd_sessions_clean(
    config: &Config,
    max_age_days: Option<u32>,
    keep: Option<usize>,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let removed = store.cleanup(
        max_age_days.unwrap_or(config.sessions.max_age_days),
        keep.unwrap_or(config.sessions.keep_recent),
    );
    println!("Removed {} session(s)", removed);
    Ok(())
}

pub fn cmd_sessions_delete(config: &Config, id: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    store.delete_session(id)?;
    println!("Deleted session {}", id);
    Ok(())
}
