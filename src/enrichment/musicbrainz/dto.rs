//! MusicBrainz API Data Transfer Objects
//!
//! These types match what the MusicBrainz recording search returns.
//! DO NOT use these types outside the musicbrainz module - convert to
//! descriptors in the adapter.
//!
//! API Reference: https://musicbrainz.org/doc/MusicBrainz_API/Search

use serde::Deserialize;

/// Recording search response
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    /// Total hits on the server side
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

/// One search hit
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Recording {
    /// MusicBrainz recording ID
    pub id: String,
    /// Search relevance, 0-100
    #[serde(default)]
    pub score: u32,
    pub title: String,
    /// Duration in milliseconds
    pub length: Option<u64>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub releases: Vec<Release>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Artist credit (can be multiple for collaborations)
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistCredit {
    pub artist: Artist,
    /// How this artist is credited (may differ from official name)
    pub name: Option<String>,
    /// Join phrase (e.g., " & ", " feat. ")
    pub joinphrase: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

/// Release (album/single/EP)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Release {
    pub id: String,
    pub title: String,
    /// Official, Bootleg, ...
    pub status: Option<String>,
    /// YYYY, YYYY-MM, or YYYY-MM-DD
    pub date: Option<String>,
    pub release_group: Option<ReleaseGroup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseGroup {
    pub id: String,
    /// Album, Single, EP, ...
    pub primary_type: Option<String>,
}

/// Folksonomy tag with vote count
#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub count: i32,
    pub name: String,
}

/// Error response from MusicBrainz API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: String,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs match what the real API returns.
// ============================================================================
