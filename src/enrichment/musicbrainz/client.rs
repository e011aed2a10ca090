//! MusicBrainz HTTP client
//!
//! Handles communication with the MusicBrainz web service.
//! See: https://musicbrainz.org/doc/MusicBrainz_API
//!
//! IMPORTANT: MusicBrainz requires a User-Agent header and rate limits to 1 req/sec.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{adapter, dto};
use crate::enrichment::EnrichmentError;
use crate::model::Descriptor;

/// User agent string - MusicBrainz requires this
const USER_AGENT: &str = concat!(
    "playstream/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/playstream/playstream)"
);

/// Minimum spacing between requests.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1000);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hits requested per search.
const SEARCH_LIMIT: u32 = 5;

/// Spaces calls at least `interval` apart across all callers.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until the next call is allowed, then claim the slot.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.interval).await;
        }
        *last = Some(Instant::now());
    }
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl MusicBrainzClient {
    pub fn new() -> Result<Self, EnrichmentError> {
        Self::with_base_url("https://musicbrainz.org/ws/2")
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
        })
    }

    /// Search for a recording by artist and title.
    ///
    /// Tries a fielded query first, then a free-text one. Returns the best
    /// hit of the first query that matches anything.
    pub async fn search_recording(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<Option<Descriptor>, EnrichmentError> {
        for query in search_queries(artist, title) {
            let response = self.send_search_request(&query).await?;
            if let Some(best) = response.recordings.into_iter().next() {
                return Ok(Some(adapter::to_descriptor(best)));
            }
        }
        Ok(None)
    }

    /// Send the HTTP request and parse the response
    async fn send_search_request(&self, query: &str) -> Result<dto::SearchResponse, EnrichmentError> {
        let url = format!(
            "{}/recording?query={}&fmt=json&limit={}",
            self.base_url,
            urlencoding::encode(query),
            SEARCH_LIMIT
        );

        self.limiter.wait().await;
        tracing::debug!(target: "enrichment", query, "MusicBrainz search");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        {
            return Err(EnrichmentError::RateLimited);
        }

        if !status.is_success() {
            if let Ok(error) = response.json::<dto::ApiError>().await {
                return Err(EnrichmentError::ApiError(error.error));
            }
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json::<dto::SearchResponse>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }
}

/// Lucene special characters that would break a quoted term.
fn escape_term(term: &str) -> String {
    term.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Queries to try in order. An empty artist searches by title alone.
fn search_queries(artist: &str, title: &str) -> Vec<String> {
    if artist.is_empty() {
        return vec![format!("recording:\"{}\"", escape_term(title))];
    }
    vec![
        format!(
            "artist:\"{}\" AND recording:\"{}\"",
            escape_term(artist),
            escape_term(title)
        ),
        format!("{} {}", artist, title),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_with_custom_url() {
        let client = MusicBrainzClient::with_base_url("http://localhost:8080").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_user_agent_format() {
        assert!(USER_AGENT.starts_with("playstream/"));
    }

    #[test]
    fn test_search_queries_escape_quotes() {
        let queries = search_queries("The \"Band\"", "Song");
        assert_eq!(queries[0], r#"artist:"The \"Band\"" AND recording:"Song""#);
        assert_eq!(queries[1], "The \"Band\" Song");

        assert_eq!(search_queries("", "Song"), vec![r#"recording:"Song""#]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_calls() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();

        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;

        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
