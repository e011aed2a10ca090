//! Core data models for the playback queue.
//!
//! Defines the primary entities: [`QueueItem`] (one playable unit) and
//! [`Descriptor`] (resolved descriptive metadata for an item).
//!
//! # Enrichment lifecycle
//!
//! Every item moves through `Unresolved → InFlight → Resolved`. Local items
//! start out resolved; remote items start unresolved and are upgraded by the
//! background workers in [`crate::queue`].

use std::fmt;

/// Placeholder title used until a real one is resolved.
pub const UNKNOWN_TITLE: &str = "Unknown Title";
/// Placeholder artist used until a real one is resolved.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
/// Placeholder collection (album) name used until a real one is resolved.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Internal ingestion id, unique within one queue manager.
pub type ItemId = u64;

/// Current wall-clock time as fractional Unix seconds, the timestamp format
/// used by both the cache table and session files.
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Where a playable item comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A file on local disk, playable immediately
    Local,
    /// A remote reference that still needs resolution
    Remote,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Remote => "remote",
        }
    }
}

/// Which resolution method produced a [`Descriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provenance {
    /// Basic lookup (filename heuristics or the remote service's own fields)
    #[default]
    BaselineLookup,
    /// Identified by audio fingerprint
    FingerprintMatch,
    /// Identified by a text search against a catalog
    TextSearchMatch,
    /// Served from the metadata cache
    CachedEntry,
}

impl Provenance {
    /// Convert to string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::BaselineLookup => "baseline",
            Provenance::FingerprintMatch => "fingerprint",
            Provenance::TextSearchMatch => "text_search",
            Provenance::CachedEntry => "cache",
        }
    }

    /// Whether this provenance comes from a real identification rather than
    /// guesswork. Such descriptors are routed to the ready buffer.
    pub fn is_match(&self) -> bool {
        matches!(
            self,
            Provenance::FingerprintMatch | Provenance::TextSearchMatch
        )
    }
}

impl std::str::FromStr for Provenance {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "fingerprint" => Provenance::FingerprintMatch,
            "text_search" => Provenance::TextSearchMatch,
            "cache" => Provenance::CachedEntry,
            _ => Provenance::BaselineLookup,
        })
    }
}

/// Resolved descriptive metadata for an item.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub title: String,
    pub artist: String,
    /// Album-like grouping
    pub album: String,
    /// Duration estimate in seconds (0 = unknown)
    pub duration_secs: u32,
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    /// External fingerprint id (AcoustID)
    pub fingerprint_id: Option<String>,
    /// External catalog id (MusicBrainz recording)
    pub catalog_id: Option<String>,
    /// Confidence score in [0, 1]
    pub confidence: f32,
    pub provenance: Provenance,
    /// Whether fingerprint enrichment was attempted for this descriptor
    pub fingerprint_attempted: bool,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            duration_secs: 0,
            genres: Vec::new(),
            year: None,
            track_number: None,
            fingerprint_id: None,
            catalog_id: None,
            confidence: 0.0,
            provenance: Provenance::BaselineLookup,
            fingerprint_attempted: false,
        }
    }
}

impl Descriptor {
    /// Baseline descriptor returned when resolution failed.
    ///
    /// Keeps whatever the hint already knew, marks enrichment as attempted
    /// and drops the confidence to zero.
    pub fn failed(hint: Option<&Descriptor>) -> Self {
        let mut descriptor = hint.cloned().unwrap_or_default();
        descriptor.confidence = 0.0;
        descriptor.provenance = Provenance::BaselineLookup;
        descriptor.fingerprint_attempted = true;
        descriptor
    }

    /// Title, artist and album are all beyond placeholder values.
    pub fn has_real_names(&self) -> bool {
        self.title != UNKNOWN_TITLE && self.artist != UNKNOWN_ARTIST && self.album != UNKNOWN_ALBUM
    }

    /// Check if the metadata seems complete and accurate.
    pub fn is_complete(&self, confidence_threshold: f32) -> bool {
        self.has_real_names()
            && self.duration_secs > 0
            && (self.confidence >= confidence_threshold
                || self.provenance == Provenance::FingerprintMatch)
    }

    /// Whether an item with this descriptor deserves a ready buffer slot.
    pub fn is_preferred(&self, confidence_threshold: f32) -> bool {
        self.is_complete(confidence_threshold) || self.provenance.is_match()
    }

    /// Duration as MM:SS, or "Unknown".
    pub fn format_duration(&self) -> String {
        if self.duration_secs == 0 {
            return "Unknown".to_string();
        }
        let (mins, secs) = (self.duration_secs / 60, self.duration_secs % 60);
        format!("{:02}:{:02}", mins, secs)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} | {} | {} | confidence {:.0}%",
            self.artist,
            self.title,
            self.album,
            self.format_duration(),
            self.confidence * 100.0
        )
    }
}

/// Enrichment state of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentState {
    Unresolved,
    InFlight,
    Resolved,
}

/// One playable unit in the queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Ingestion id, assigned by the queue state
    pub id: ItemId,
    pub source: SourceKind,
    /// Filesystem path for local items, remote identifier for remote ones
    pub locator: String,
    pub descriptor: Option<Descriptor>,
    pub descriptor_ready: bool,
    /// Distinguishes "not yet tried" from "tried, inconclusive"
    pub enrichment_attempted: bool,
    /// Set while a worker owns the item
    pub enrichment_in_flight: bool,
    /// Higher is served first; fixed at ingestion
    pub priority: i32,
}

impl QueueItem {
    /// Create a local item. Local items never wait for enrichment.
    pub fn local(locator: impl Into<String>, descriptor: Descriptor, priority: i32) -> Self {
        Self {
            id: 0,
            source: SourceKind::Local,
            locator: locator.into(),
            descriptor: Some(descriptor),
            descriptor_ready: true,
            enrichment_attempted: false,
            enrichment_in_flight: false,
            priority,
        }
    }

    /// Create an unresolved remote item.
    pub fn remote(locator: impl Into<String>) -> Self {
        Self {
            id: 0,
            source: SourceKind::Remote,
            locator: locator.into(),
            descriptor: None,
            descriptor_ready: false,
            enrichment_attempted: false,
            enrichment_in_flight: false,
            priority: 0,
        }
    }

    pub fn state(&self) -> EnrichmentState {
        if self.enrichment_in_flight {
            EnrichmentState::InFlight
        } else if self.descriptor_ready {
            EnrichmentState::Resolved
        } else {
            EnrichmentState::Unresolved
        }
    }

    /// Unresolved and not owned by any worker.
    pub fn is_claimable(&self) -> bool {
        self.state() == EnrichmentState::Unresolved
    }

    /// Get the display title ("Artist - Title", falling back to the locator).
    pub fn display_title(&self) -> String {
        match &self.descriptor {
            Some(d) => format!("{} - {}", d.artist, d.title),
            None => self.locator.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Descriptor {
        Descriptor {
            title: "Song".to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            duration_secs: 200,
            confidence: 0.8,
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_requires_real_names() {
        assert!(complete().is_complete(0.7));

        let placeholder = Descriptor {
            album: UNKNOWN_ALBUM.to_string(),
            ..complete()
        };
        assert!(!placeholder.is_complete(0.7));
    }

    #[test]
    fn test_complete_requires_duration() {
        let no_duration = Descriptor {
            duration_secs: 0,
            ..complete()
        };
        assert!(!no_duration.is_complete(0.7));
    }

    #[test]
    fn test_fingerprint_match_overrides_confidence() {
        let low = Descriptor {
            confidence: 0.1,
            ..complete()
        };
        assert!(!low.is_complete(0.7));

        let fingerprinted = Descriptor {
            provenance: Provenance::FingerprintMatch,
            ..low
        };
        assert!(fingerprinted.is_complete(0.7));
    }

    #[test]
    fn test_text_search_is_preferred_even_if_incomplete() {
        let d = Descriptor {
            provenance: Provenance::TextSearchMatch,
            confidence: 0.5,
            duration_secs: 0,
            ..complete()
        };
        assert!(!d.is_complete(0.7));
        assert!(d.is_preferred(0.7));
    }

    #[test]
    fn test_failed_keeps_hint_names() {
        let failed = Descriptor::failed(Some(&complete()));
        assert_eq!(failed.title, "Song");
        assert_eq!(failed.confidence, 0.0);
        assert!(failed.fingerprint_attempted);

        let bare = Descriptor::failed(None);
        assert_eq!(bare.title, UNKNOWN_TITLE);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(complete().format_duration(), "03:20");
        assert_eq!(Descriptor::default().format_duration(), "Unknown");
    }

    #[test]
    fn test_provenance_storage_strings() {
        for p in [
            Provenance::BaselineLookup,
            Provenance::FingerprintMatch,
            Provenance::TextSearchMatch,
            Provenance::CachedEntry,
        ] {
            assert_eq!(p.as_str().parse::<Provenance>().unwrap(), p);
        }
        assert_eq!(
            "garbage".parse::<Provenance>().unwrap(),
            Provenance::BaselineLookup
        );
    }

    #[test]
    fn test_item_states() {
        let mut item = QueueItem::remote("https://example.com/a");
        assert_eq!(item.state(), EnrichmentState::Unresolved);
        assert!(item.is_claimable());

        item.enrichment_in_flight = true;
        assert_eq!(item.state(), EnrichmentState::InFlight);
        assert!(!item.is_claimable());

        let local = QueueItem::local("/music/a.mp3", complete(), 2);
        assert_eq!(local.state(), EnrichmentState::Resolved);
        assert_eq!(local.display_title(), "Artist - Song");
    }
}
