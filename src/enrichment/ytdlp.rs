//! Remote catalog listing and baseline lookups via `yt-dlp`.
//!
//! Shells out to the `yt-dlp` command-line tool rather than talking to the
//! remote service directly; the tool tracks the service's changes for us.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::process::Command;

use super::EnrichmentError;
use super::traits::{BaselineLookup, RemoteCatalog};
use crate::model::{Descriptor, Provenance, UNKNOWN_ALBUM, UNKNOWN_ARTIST, UNKNOWN_TITLE};

/// Playlists are cut off after this many entries.
pub const PLAYLIST_LIMIT: usize = 1000;

/// Duration assumed when the service does not report one.
pub const FALLBACK_DURATION_SECS: u32 = 210;

const LIST_TIMEOUT: Duration = Duration::from_secs(60);
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

const MAX_TITLE_CHARS: usize = 200;
const MAX_NAME_CHARS: usize = 100;

/// Subset of `yt-dlp --dump-single-json` we read.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    genres: Vec<String>,
    release_year: Option<i32>,
    track_number: Option<u32>,
}

/// `yt-dlp` wrapper implementing both [`RemoteCatalog`] and [`BaselineLookup`].
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str], limit: Duration) -> Result<String, EnrichmentError> {
        let mut command = Command::new(&self.program);
        command.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| EnrichmentError::Timeout(limit))?
            .map_err(|e| EnrichmentError::tool(&self.program, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnrichmentError::tool(&self.program, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl RemoteCatalog for YtDlp {
    async fn fetch(&self, source: &str) -> Result<Vec<String>, EnrichmentError> {
        let limit = PLAYLIST_LIMIT.to_string();
        let stdout = self
            .run(
                &[
                    "--flat-playlist",
                    "--print",
                    "%(url)s",
                    "--playlist-end",
                    &limit,
                    source,
                ],
                LIST_TIMEOUT,
            )
            .await?;
        Ok(parse_listing(&stdout))
    }
}

#[async_trait]
impl BaselineLookup for YtDlp {
    async fn lookup(&self, locator: &str) -> Result<Descriptor, EnrichmentError> {
        let stdout = self
            .run(
                &["--dump-single-json", "--skip-download", "--no-playlist", locator],
                LOOKUP_TIMEOUT,
            )
            .await?;
        parse_video_info(&stdout)
    }
}

/// Keep http(s) lines only.
pub fn parse_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(str::to_string)
        .collect()
}

/// Concatenate listings, keeping the first occurrence of each locator.
pub fn dedup_locators(listings: impl IntoIterator<Item = Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .flatten()
        .filter(|locator| seen.insert(locator.clone()))
        .collect()
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Non-empty, non-"NA" string or the placeholder.
fn field_or(value: Option<String>, placeholder: &str, max: usize) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "NA")
        .map(|v| truncate(&v, max))
        .unwrap_or_else(|| placeholder.to_string())
}

fn parse_video_info(stdout: &str) -> Result<Descriptor, EnrichmentError> {
    let info: VideoInfo =
        serde_json::from_str(stdout.trim()).map_err(|e| EnrichmentError::Parse(e.to_string()))?;

    let duration_secs = info
        .duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.round() as u32)
        .unwrap_or(FALLBACK_DURATION_SECS);

    Ok(Descriptor {
        title: field_or(info.title, UNKNOWN_TITLE, MAX_TITLE_CHARS),
        artist: field_or(info.artist, UNKNOWN_ARTIST, MAX_NAME_CHARS),
        album: field_or(info.album, UNKNOWN_ALBUM, MAX_NAME_CHARS),
        duration_secs,
        genres: info.genres,
        year: info.release_year,
        track_number: info.track_number,
        provenance: Provenance::BaselineLookup,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_keeps_http_lines() {
        let stdout = "https://www.youtube.com/watch?v=a\n\n  http://example.com/b  \nNA\nftp://nope\n";
        assert_eq!(
            parse_listing(stdout),
            vec!["https://www.youtube.com/watch?v=a", "http://example.com/b"]
        );
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let merged = dedup_locators(vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string(), "a".to_string(), "b".to_string(), "d".to_string()],
        ]);
        assert_eq!(merged, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_parse_video_info() {
        let json = r#"{
            "id": "xyz",
            "title": "Bohemian Rhapsody",
            "artist": "Queen",
            "album": "A Night at the Opera",
            "duration": 354.4,
            "genres": ["Rock"],
            "release_year": 1975,
            "view_count": 123
        }"#;
        let d = parse_video_info(json).unwrap();
        assert_eq!(d.title, "Bohemian Rhapsody");
        assert_eq!(d.artist, "Queen");
        assert_eq!(d.duration_secs, 354);
        assert_eq!(d.year, Some(1975));
        assert_eq!(d.provenance, Provenance::BaselineLookup);
    }

    #[test]
    fn test_parse_video_info_fills_placeholders() {
        let d = parse_video_info(r#"{"title": "Some Upload", "artist": null}"#).unwrap();
        assert_eq!(d.artist, UNKNOWN_ARTIST);
        assert_eq!(d.album, UNKNOWN_ALBUM);
        assert_eq!(d.duration_secs, FALLBACK_DURATION_SECS);
    }

    #[test]
    fn test_parse_video_info_rejects_garbage() {
        assert!(matches!(
            parse_video_info("ERROR: not json"),
            Err(EnrichmentError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_error() {
        let ytdlp = YtDlp::new("definitely-not-a-real-program-7f3a");
        let result = ytdlp.fetch("https://example.com/list").await;
        assert!(matches!(result, Err(EnrichmentError::Tool { .. })));
    }
}
