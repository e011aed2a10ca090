//! Tiered metadata resolver - what the queue workers call per remote item.
//!
//! Resolution order:
//! 1. Metadata cache (a complete entry wins outright)
//! 2. Baseline lookup from the remote service itself
//! 3. Catalog text search when enabled
//!
//! The result is written back to the cache. Every path returns a
//! descriptor; errors only show up in the log.

use async_trait::async_trait;
use std::sync::Arc;

use super::traits::{BaselineLookup, MetadataResolver, TextSearchApi};
use crate::cache::MetadataCache;
use crate::config::EnrichmentConfig;
use crate::model::{Descriptor, Provenance, UNKNOWN_ARTIST, UNKNOWN_TITLE};

/// Settings for the resolver
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Confidence at which a cached descriptor counts as complete
    pub confidence_threshold: f32,
    /// Whether to run the text search tier
    pub text_search: bool,
    /// Confidence given to any text search hit
    pub text_search_confidence: f32,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from(&EnrichmentConfig::default())
    }
}

impl From<&EnrichmentConfig> for ResolverSettings {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            text_search: config.text_search,
            text_search_confidence: config.text_search_confidence,
        }
    }
}

/// Resolver combining cache, baseline lookup and text search.
pub struct TieredResolver {
    cache: Option<MetadataCache>,
    baseline: Arc<dyn BaselineLookup>,
    text_search: Option<Arc<dyn TextSearchApi>>,
    settings: ResolverSettings,
}

impl TieredResolver {
    pub fn new(
        cache: Option<MetadataCache>,
        baseline: Arc<dyn BaselineLookup>,
        text_search: Option<Arc<dyn TextSearchApi>>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            cache,
            baseline,
            text_search,
            settings,
        }
    }

    async fn cached(&self, locator: &str) -> Option<Descriptor> {
        let cache = self.cache.as_ref()?;
        match cache.get(locator).await {
            Ok(Some(hit)) if hit.is_complete(self.settings.confidence_threshold) => Some(hit),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(target: "enrichment", "Cache lookup failed for {}: {}", locator, e);
                None
            }
        }
    }

    async fn baseline(&self, locator: &str, hint: Option<&Descriptor>) -> Descriptor {
        match self.baseline.lookup(locator).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::warn!(target: "enrichment", "Baseline lookup failed for {}: {}", locator, e);
                Descriptor::failed(hint)
            }
        }
    }

    /// Replace the baseline with the first search hit, if any.
    async fn search(&self, baseline: &Descriptor) -> Option<Descriptor> {
        if !self.settings.text_search || baseline.title == UNKNOWN_TITLE {
            return None;
        }
        let api = self.text_search.as_ref()?;
        let artist = if baseline.artist == UNKNOWN_ARTIST {
            ""
        } else {
            baseline.artist.as_str()
        };

        match api.search(artist, &baseline.title).await {
            Ok(Some(hit)) => {
                // The search score is not trusted; a hit gets the configured confidence
                tracing::debug!(target: "enrichment", score = hit.confidence, "Text search hit");
                Some(merge_hit(hit, baseline, self.settings.text_search_confidence))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(target: "enrichment", "Text search failed: {}", e);
                None
            }
        }
    }
}

/// Search hit fields win; gaps are filled from the baseline.
fn merge_hit(hit: Descriptor, baseline: &Descriptor, confidence: f32) -> Descriptor {
    let placeholder = Descriptor::default();
    let pick = |found: String, fallback: &String, unknown: &String| {
        if &found == unknown { fallback.clone() } else { found }
    };

    Descriptor {
        title: pick(hit.title, &baseline.title, &placeholder.title),
        artist: pick(hit.artist, &baseline.artist, &placeholder.artist),
        album: pick(hit.album, &baseline.album, &placeholder.album),
        duration_secs: if hit.duration_secs > 0 {
            hit.duration_secs
        } else {
            baseline.duration_secs
        },
        genres: if hit.genres.is_empty() {
            baseline.genres.clone()
        } else {
            hit.genres
        },
        year: hit.year.or(baseline.year),
        track_number: hit.track_number.or(baseline.track_number),
        fingerprint_id: baseline.fingerprint_id.clone(),
        catalog_id: hit.catalog_id,
        confidence,
        provenance: Provenance::TextSearchMatch,
        fingerprint_attempted: true,
    }
}

#[async_trait]
impl MetadataResolver for TieredResolver {
    async fn resolve(&self, locator: &str, hint: Option<&Descriptor>) -> Descriptor {
        if let Some(hit) = self.cached(locator).await {
            tracing::debug!(target: "enrichment", locator, "Resolved from cache");
            return Descriptor {
                provenance: Provenance::CachedEntry,
                ..hit
            };
        }

        let mut descriptor = self.baseline(locator, hint).await;
        // No fingerprint tier is available; record that it was passed
        descriptor.fingerprint_attempted = true;

        if let Some(enhanced) = self.search(&descriptor).await {
            descriptor = enhanced;
        }

        if let Some(cache) = &self.cache
            && let Err(e) = cache.put(locator, &descriptor).await
        {
            tracing::warn!(target: "enrichment", "Failed to cache metadata for {}: {}", locator, e);
        }

        tracing::debug!(target: "enrichment", locator, provenance = descriptor.provenance.as_str(), "Resolved");
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentError;
    use crate::enrichment::traits::mocks::{MockBaseline, MockTextSearch};
    use crate::model::UNKNOWN_ALBUM;
    use crate::test_utils::{mock_descriptor, temp_cache};
    use std::sync::atomic::Ordering;

    fn baseline_only() -> Descriptor {
        Descriptor {
            title: "Song".to_string(),
            artist: "Artist".to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            duration_secs: 210,
            ..Default::default()
        }
    }

    fn search_hit(score: f32) -> Descriptor {
        Descriptor {
            title: "Song (Remastered)".to_string(),
            artist: "Artist".to_string(),
            album: "Real Album".to_string(),
            duration_secs: 0,
            catalog_id: Some("rec-9".to_string()),
            confidence: score,
            provenance: Provenance::TextSearchMatch,
            ..Default::default()
        }
    }

    fn resolver(
        cache: Option<MetadataCache>,
        baseline: Arc<MockBaseline>,
        search: Arc<MockTextSearch>,
    ) -> TieredResolver {
        TieredResolver::new(cache, baseline, Some(search), ResolverSettings::default())
    }

    #[tokio::test]
    async fn test_complete_cache_entry_short_circuits() {
        let (cache, _dir) = temp_cache().await;
        cache.put("x", &mock_descriptor()).await.unwrap();
        let baseline = Arc::new(MockBaseline::returning(baseline_only()));
        let search = Arc::new(MockTextSearch::no_matches());

        let r = resolver(Some(cache), baseline.clone(), search);
        let d = r.resolve("x", None).await;

        assert_eq!(d.provenance, Provenance::CachedEntry);
        assert_eq!(d.title, mock_descriptor().title);
        assert_eq!(baseline.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_text_search_upgrades_baseline_and_is_cached() {
        let (cache, _dir) = temp_cache().await;
        let baseline = Arc::new(MockBaseline::returning(baseline_only()));
        let search = Arc::new(MockTextSearch::single_match(search_hit(0.9)));

        let r = resolver(Some(cache.clone()), baseline, search);
        let d = r.resolve("x", None).await;

        assert_eq!(d.provenance, Provenance::TextSearchMatch);
        assert_eq!(d.album, "Real Album");
        assert_eq!(d.duration_secs, 210);
        assert_eq!(d.confidence, 0.5);
        assert!(d.fingerprint_attempted);
        assert_eq!(cache.get("x").await.unwrap(), Some(d));
    }

    #[tokio::test]
    async fn test_low_score_search_hit_gets_configured_confidence() {
        let baseline = Arc::new(MockBaseline::returning(baseline_only()));
        let search = Arc::new(MockTextSearch::single_match(search_hit(0.2)));

        let d = resolver(None, baseline, search).resolve("x", None).await;
        assert_eq!(d.provenance, Provenance::TextSearchMatch);
        assert_eq!(d.album, "Real Album");
        assert_eq!(d.confidence, ResolverSettings::default().text_search_confidence);
        assert!(d.fingerprint_attempted);
    }

    #[tokio::test]
    async fn test_no_search_hit_keeps_baseline() {
        let baseline = Arc::new(MockBaseline::returning(baseline_only()));
        let search = Arc::new(MockTextSearch::no_matches());

        let d = resolver(None, baseline, search).resolve("x", None).await;
        assert_eq!(d.provenance, Provenance::BaselineLookup);
        assert_eq!(d.album, UNKNOWN_ALBUM);
        assert!(d.fingerprint_attempted);
    }

    #[tokio::test]
    async fn test_everything_failing_still_returns_descriptor() {
        let baseline = Arc::new(MockBaseline::with_error(EnrichmentError::tool("yt-dlp", "boom")));
        let search = Arc::new(MockTextSearch::with_error(EnrichmentError::RateLimited));
        let hint = baseline_only();

        let d = resolver(None, baseline, search.clone())
            .resolve("x", Some(&hint))
            .await;
        assert_eq!(d.title, "Song");
        assert_eq!(d.confidence, 0.0);
        assert!(d.fingerprint_attempted);
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_text_search_disabled() {
        let baseline = Arc::new(MockBaseline::returning(baseline_only()));
        let search = Arc::new(MockTextSearch::single_match(search_hit(1.0)));
        let settings = ResolverSettings {
            text_search: false,
            ..Default::default()
        };

        let r = TieredResolver::new(None, baseline, Some(search.clone()), settings);
        r.resolve("x", None).await;
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    }
}
