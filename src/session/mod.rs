//! Session persistence.
//!
//! A session is an ordered list of remote locators plus a resume offset.
//! Each session lives in its own `<session_id>.json` file inside the
//! sessions directory. Files written by older versions are accepted:
//! renamed keys have aliases and missing fields get defaults.
//!
//! The resume decision itself lives in [`chooser`], away from the store.

pub mod chooser;

pub use chooser::{
    AlwaysNew, ResumeLatest, SessionChoice, SessionChooser, SessionPlan, plan_session,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::model::unix_now;

/// Format version written into new session files.
pub const SESSION_VERSION: &str = "4.2";

/// Average item length used for remaining-time estimates.
pub const AVG_ITEM_MINUTES: f64 = 3.5;

/// Locators sampled for the session id hash.
const ID_SAMPLE: usize = 10;

fn default_version() -> String {
    SESSION_VERSION.to_string()
}

/// One persisted listening run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub name: String,
    /// Unix seconds
    pub created: f64,
    /// Unix seconds
    pub last_accessed: f64,
    #[serde(alias = "index")]
    pub current_index: usize,
    #[serde(default)]
    pub total_songs: usize,
    #[serde(alias = "videos")]
    pub locators: Vec<String>,
    #[serde(default, alias = "current_url")]
    pub current_locator: Option<String>,
    #[serde(default)]
    pub play_count: u64,
    #[serde(default = "default_version")]
    pub version: String,
}

impl Session {
    /// Fill in fields older formats left out.
    fn normalize(mut self) -> Self {
        if self.total_songs == 0 {
            self.total_songs = self.locators.len();
        }
        self
    }

    pub fn age_hours(&self) -> f64 {
        (unix_now() - self.created) / 3600.0
    }

    pub fn last_used_hours(&self) -> f64 {
        (unix_now() - self.last_accessed) / 3600.0
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_songs == 0 {
            return 0.0;
        }
        self.current_index as f64 / self.total_songs as f64 * 100.0
    }

    pub fn estimated_remaining_hours(&self, avg_item_minutes: f64) -> f64 {
        let remaining = self.total_songs.saturating_sub(self.current_index);
        remaining as f64 * avg_item_minutes / 60.0
    }

    /// Locators from the resume offset onwards.
    pub fn remaining_locators(&self) -> &[String] {
        let start = self.current_index.min(self.locators.len());
        &self.locators[start..]
    }

    /// One-line description for listings and logs.
    pub fn summary(&self) -> String {
        let used = self.last_used_hours();
        let used = if used < 24.0 {
            format!("{:.1}h ago", used)
        } else {
            format!("{:.1}d ago", used / 24.0)
        };
        format!(
            "{} [{}] {:.1}% ({}/{}) | last used {} | ~{:.1}h remaining",
            self.name,
            self.session_id,
            self.progress_percent(),
            self.current_index,
            self.total_songs,
            used,
            self.estimated_remaining_hours(AVG_ITEM_MINUTES)
        )
    }
}

/// Session persistence errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to create sessions directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write session file {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to delete session file {0}: {1}")]
    Delete(PathBuf, std::io::Error),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Invalid session id: {0:?}")]
    InvalidId(String),
}

/// Content-derived id: hash of the first locators plus the current second.
fn generate_session_id(locators: &[String]) -> String {
    let mut hasher = Sha256::new();
    for locator in locators.iter().take(ID_SAMPLE) {
        hasher.update(locator.as_bytes());
    }
    hasher.update(format!("_{}", unix_now() as i64).as_bytes());
    hasher
        .finalize()
        .iter()
        .take(6)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Directory of session files plus the session currently being played.
#[derive(Debug)]
pub struct SessionStore {
    dir: PathBuf,
    /// Also serializes writes of the active session
    active: Mutex<Option<Session>>,
}

impl SessionStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| SessionError::CreateDir(dir.clone(), e))?;
        Ok(Self {
            dir,
            active: Mutex::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ids name a file inside the store directory, so only ASCII
    /// alphanumerics, `-` and `_` are accepted.
    fn file_path(&self, session_id: &str) -> Result<PathBuf, SessionError> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SessionError::InvalidId(session_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", session_id)))
    }

    /// Write via a temp file so a crash never leaves a half-written session.
    fn save(&self, session: &Session) -> Result<(), SessionError> {
        let contents = serde_json::to_string_pretty(session)?;
        let path = self.file_path(&session.session_id)?;
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents)
            .map_err(|e| SessionError::Write(temp_path.clone(), e))?;
        std::fs::rename(&temp_path, &path).map_err(|e| SessionError::Write(path, e))?;
        Ok(())
    }

    fn read(path: &Path) -> Option<Session> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "session", "Failed to read session file {:?}: {}", path, e);
                return None;
            }
        };
        match serde_json::from_str::<Session>(&contents) {
            Ok(session) => Some(session.normalize()),
            Err(e) => {
                tracing::warn!(target: "session", "Corrupted session file {:?}: {}", path, e);
                None
            }
        }
    }

    /// All readable sessions, most recently used first.
    pub fn list_sessions(&self) -> Vec<Session> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(target: "session", "Failed to list sessions in {:?}: {}", self.dir, e);
                return Vec::new();
            }
        };

        let mut sessions: Vec<Session> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|p| Self::read(&p))
            .collect();

        sessions.sort_by(|a, b| b.last_accessed.total_cmp(&a.last_accessed));
        sessions
    }

    /// Create and persist a new session, making it the active one.
    ///
    /// A failed write is logged; the session is still active in memory.
    pub fn create_session(&self, locators: Vec<String>, name: Option<String>) -> Session {
        let now = unix_now();
        let name = name.unwrap_or_else(|| {
            chrono::Local::now()
                .format("Session_%m%d_%H%M")
                .to_string()
        });
        let session = Session {
            session_id: generate_session_id(&locators),
            name,
            created: now,
            last_accessed: now,
            current_index: 0,
            total_songs: locators.len(),
            locators,
            current_locator: None,
            play_count: 0,
            version: default_version(),
        };

        let mut active = self.active.lock();
        if let Err(e) = self.save(&session) {
            tracing::warn!(target: "session", "Failed to save new session: {}", e);
        }
        tracing::info!(target: "session", id = %session.session_id, total = session.total_songs, "Created session {}", session.name);
        *active = Some(session.clone());
        session
    }

    /// Load a session by id, refresh its last-access time and make it active.
    ///
    /// Returns `None` if the file is missing or unreadable.
    pub fn load_session(&self, session_id: &str) -> Option<Session> {
        let path = match self.file_path(session_id) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(target: "session", "{}", e);
                return None;
            }
        };
        if !path.exists() {
            return None;
        }
        let mut session = Self::read(&path)?;
        session.last_accessed = unix_now();

        let mut active = self.active.lock();
        if let Err(e) = self.save(&session) {
            tracing::warn!(target: "session", "Failed to persist loaded session: {}", e);
        }
        *active = Some(session.clone());
        Some(session)
    }

    /// Record the resume offset of the active session and persist it.
    ///
    /// Does nothing when no session is active.
    pub fn update_progress(
        &self,
        index: usize,
        current_locator: Option<&str>,
    ) -> Result<(), SessionError> {
        let mut active = self.active.lock();
        let Some(session) = active.as_mut() else {
            return Ok(());
        };

        session.current_index = index;
        session.last_accessed = unix_now();
        session.play_count += 1;
        if let Some(locator) = current_locator {
            session.current_locator = Some(locator.to_string());
        }
        self.save(session)
    }

    /// Delete sessions unused for `max_age_days`, always keeping the
    /// `keep_recent` most recently used ones. Returns the number removed.
    pub fn cleanup(&self, max_age_days: u32, keep_recent: usize) -> usize {
        let cutoff = unix_now() - f64::from(max_age_days) * 24.0 * 3600.0;
        let mut removed = 0;

        for session in self.list_sessions().into_iter().skip(keep_recent) {
            if session.last_accessed >= cutoff {
                continue;
            }
            match self.delete_session(&session.session_id) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(target: "session", "{}", e),
            }
        }

        if removed > 0 {
            tracing::info!(target: "session", removed, "Cleaned up old sessions");
        }
        removed
    }

    pub fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        let path = self.file_path(session_id)?;
        if !path.exists() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        std::fs::remove_file(&path).map_err(|e| SessionError::Delete(path, e))?;

        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|s| s.session_id == session_id) {
            *active = None;
        }
        Ok(())
    }

    /// Snapshot of the active session.
    pub fn active(&self) -> Option<Session> {
        self.active.lock().clone()
    }
}
