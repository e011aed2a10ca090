//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\playstream\config.toml
//! - macOS: ~/Library/Application Support/playstream/config.toml
//! - Linux: ~/.config/playstream/config.toml
//!
//! The config file is human-readable and editable. Every section is
//! `#[serde(default)]`, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local music directories
    pub library: LibraryConfig,

    /// Remote catalog sources
    pub remote: RemoteConfig,

    /// Background metadata enrichment
    pub enrichment: EnrichmentConfig,

    /// Metadata cache
    pub cache: CacheConfig,

    /// Session persistence
    pub sessions: SessionConfig,

    /// External player process
    pub player: PlayerConfig,
}

/// Local library settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Priority tier label ("1".."4") to directory. Higher tiers play first.
    pub tiers: BTreeMap<String, PathBuf>,
}

/// Remote catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Playlist references to list items from
    pub sources: Vec<String>,

    /// Program used to list playlists and look up baseline metadata
    pub ytdlp_program: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            ytdlp_program: "yt-dlp".to_string(),
        }
    }
}

/// Enrichment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Requested background workers (the queue caps this at 3)
    pub max_workers: usize,

    /// Confidence at which a descriptor counts as complete (0.0 - 1.0)
    pub confidence_threshold: f32,

    /// Whether to fall back to a MusicBrainz text search
    pub text_search: bool,

    /// Confidence assigned to text search matches
    pub text_search_confidence: f32,

    /// Upper bound for a single resolution
    pub resolve_timeout_secs: u64,

    /// How many enriched items to hold ready for playback
    pub ready_buffer_capacity: usize,

    /// Idle worker poll interval
    pub poll_interval_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            confidence_threshold: 0.7,
            text_search: true,
            text_search_confidence: 0.5,
            resolve_timeout_secs: 120,
            ready_buffer_capacity: 10,
            poll_interval_ms: 1000,
        }
    }
}

impl EnrichmentConfig {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Metadata cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Database file (default: data directory)
    pub path: Option<PathBuf>,

    /// Entries older than this are swept at startup
    pub max_age_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_age_days: 30,
        }
    }
}

impl CacheConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir().join("metadata.db"))
    }
}

/// Session persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding one JSON file per session (default: data directory)
    pub dir: Option<PathBuf>,

    /// Most recent session is resumed without asking if used within this many hours
    pub auto_resume_hours: f64,

    /// Sessions unused for longer than this are deleted at startup...
    pub max_age_days: u32,

    /// ...except for this many most recently used ones
    pub keep_recent: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: None,
            auto_resume_hours: 4.0,
            max_age_days: 7,
            keep_recent: 5,
        }
    }
}

impl SessionConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| data_dir().join("sessions"))
    }
}

/// External player settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Player executable
    pub program: String,

    /// Arguments placed before the locator
    pub args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: "mpv".to_string(),
            args: vec![
                "--no-video".to_string(),
                "--quiet".to_string(),
                "--no-terminal".to_string(),
            ],
        }
    }
}

impl Config {
    /// Clamp out-of-range values instead of rejecting the file.
    pub fn sanitized(mut self) -> Self {
        let e = &mut self.enrichment;
        e.confidence_threshold = e.confidence_threshold.clamp(0.0, 1.0);
        e.text_search_confidence = e.text_search_confidence.clamp(0.0, 1.0);
        e.ready_buffer_capacity = e.ready_buffer_capacity.max(1);
        e.poll_interval_ms = e.poll_interval_ms.max(10);
        self
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("playstream"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Directory for the cache database and session files
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".playstream"))
        .join("playstream")
}

/// Load configuration from the default location
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!(target: "config", "Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from an explicit path, with the same fallbacks as [`load`].
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!(target: "config", "No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(config) => {
                tracing::info!(target: "config", "Loaded config from {:?}", path);
                config.sanitized()
            }
            Err(e) => {
                tracing::error!(target: "config", "Failed to parse config file {:?}: {}", path, e);
                tracing::warn!(target: "config", "Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!(target: "config", "Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!(target: "config", "Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[remote]"));
        assert!(toml.contains("[enrichment]"));
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("[sessions]"));
        assert!(toml.contains("[player]"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config
            .library
            .tiers
            .insert("3".to_string(), PathBuf::from("/music/3star"));
        config.remote.sources.push("https://example.com/list".to_string());
        config.enrichment.max_workers = 2;

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(
            parsed.library.tiers.get("3"),
            Some(&PathBuf::from("/music/3star"))
        );
        assert_eq!(parsed.remote.sources, vec!["https://example.com/list"]);
        assert_eq!(parsed.enrichment.max_workers, 2);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[enrichment]
max_workers = 1
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.enrichment.max_workers, 1);
        assert_eq!(config.enrichment.confidence_threshold, 0.7);
        assert_eq!(config.sessions.keep_recent, 5);
        assert_eq!(config.player.program, "mpv");
        assert!(config.library.tiers.is_empty());
    }

    #[test]
    fn test_thresholds_are_clamped() {
        let toml = r#"
[enrichment]
confidence_threshold = 1.7
text_search_confidence = -0.2
ready_buffer_capacity = 0
"#;
        let config = toml::from_str::<Config>(toml).unwrap().sanitized();
        assert_eq!(config.enrichment.confidence_threshold, 1.0);
        assert_eq!(config.enrichment.text_search_confidence, 0.0);
        assert_eq!(config.enrichment.ready_buffer_capacity, 1);
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.sessions.auto_resume_hours = 2.5;
        save_to(&config, &path).unwrap();

        let loaded = load_from(&path);
        assert_eq!(loaded.sessions.auto_resume_hours, 2.5);
    }

    #[test]
    fn test_unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [not toml").unwrap();

        let loaded = load_from(&path);
        assert_eq!(loaded.enrichment.max_workers, 3);
    }
}
