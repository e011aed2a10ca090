//! Adapter layer: Convert MusicBrainz DTOs to descriptors
//!
//! This is the ONLY place where MusicBrainz DTO types are converted.

use super::dto;
use crate::model::{Descriptor, Provenance, UNKNOWN_ALBUM, UNKNOWN_ARTIST};

/// Tags kept as genres, most voted first.
const MAX_GENRES: usize = 5;

/// Convert the best search hit into a descriptor.
///
/// The confidence is the search score scaled into [0, 1]. Duration is 0
/// when MusicBrainz does not know the length.
pub fn to_descriptor(recording: dto::Recording) -> Descriptor {
    let artist = build_artist_string(&recording.artist_credit)
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let release = best_release(&recording.releases);

    let album = release
        .map(|r| r.title.clone())
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());

    // YYYY, YYYY-MM, or YYYY-MM-DD
    let year = release
        .and_then(|r| r.date.as_deref())
        .and_then(|d| d.split('-').next())
        .and_then(|y| y.parse().ok());

    Descriptor {
        title: recording.title,
        artist,
        album,
        duration_secs: recording
            .length
            .map(|ms| (ms / 1000) as u32)
            .unwrap_or(0),
        genres: extract_genres(&recording.tags),
        year,
        track_number: None,
        fingerprint_id: None,
        catalog_id: Some(recording.id),
        confidence: (recording.score.min(100) as f32) / 100.0,
        provenance: Provenance::TextSearchMatch,
        fingerprint_attempted: false,
    }
}

/// Build a combined artist string from artist credits
fn build_artist_string(credits: &[dto::ArtistCredit]) -> Option<String> {
    if credits.is_empty() {
        return None;
    }

    let mut result = String::new();
    for credit in credits {
        result.push_str(credit.name.as_ref().unwrap_or(&credit.artist.name));
        if let Some(ref join) = credit.joinphrase {
            result.push_str(join);
        }
    }
    Some(result)
}

/// Prefer official albums, then any official release, then whatever is first.
fn best_release(releases: &[dto::Release]) -> Option<&dto::Release> {
    let is_official = |r: &&dto::Release| r.status.as_deref() == Some("Official");

    releases
        .iter()
        .filter(is_official)
        .find(|r| {
            r.release_group
                .as_ref()
                .and_then(|rg| rg.primary_type.as_deref())
                == Some("Album")
        })
        .or_else(|| releases.iter().find(is_official))
        .or_else(|| releases.first())
}

fn extract_genres(tags: &[dto::Tag]) -> Vec<String> {
    let mut sorted: Vec<_> = tags.iter().filter(|t| t.count > 0).collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count));
    sorted
        .into_iter()
        .take(MAX_GENRES)
        .map(|t| t.name.clone())
        .collect()
}
