//! Persistent metadata cache.
//!
//! Uses SQLx with SQLite for a single `metadata` table keyed by locator.
//! Provides async operations for:
//! - Lookup with last-access refresh ([`MetadataCache::get`])
//! - Upsert of resolved descriptors ([`MetadataCache::put`])
//! - A one-shot retention sweep when the cache is opened
//!
//! The schema is upgraded in place: columns missing from an older database
//! are added with `ALTER TABLE`, existing rows are never dropped.
//!
//! # Example
//!
//! ```ignore
//! let cache = MetadataCache::open(Path::new("metadata.db"), 30).await?;
//! cache.put("https://example.com/watch?v=1", &descriptor).await?;
//! let hit = cache.get("https://example.com/watch?v=1").await?;
//! ```

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{ResultExt, Result};
use crate::model::{Descriptor, Provenance, unix_now};

/// Columns beyond the `locator` key, with their SQLite declarations.
///
/// New columns go at the end; `ensure_schema` adds any that an existing
/// database lacks.
const COLUMNS: &[(&str, &str)] = &[
    ("title", "TEXT"),
    ("artist", "TEXT"),
    ("album", "TEXT"),
    ("duration", "INTEGER"),
    ("genres", "TEXT"),
    ("year", "INTEGER"),
    ("track_number", "INTEGER"),
    ("fingerprint_id", "TEXT"),
    ("catalog_id", "TEXT"),
    ("confidence", "REAL"),
    ("provenance", "TEXT"),
    ("inserted_at", "REAL"),
    ("last_accessed", "REAL"),
    ("fingerprint_attempted", "INTEGER NOT NULL DEFAULT 0"),
];

const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;

/// Database row for the metadata table.
///
/// Every column is optional so rows written by older schemas still load.
#[derive(Debug, sqlx::FromRow)]
struct CacheRow {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    duration: Option<i64>,
    genres: Option<String>,
    year: Option<i64>,
    track_number: Option<i64>,
    fingerprint_id: Option<String>,
    catalog_id: Option<String>,
    confidence: Option<f64>,
    provenance: Option<String>,
    fingerprint_attempted: Option<i64>,
}

impl From<CacheRow> for Descriptor {
    fn from(row: CacheRow) -> Self {
        let defaults = Descriptor::default();
        Descriptor {
            title: row.title.unwrap_or(defaults.title),
            artist: row.artist.unwrap_or(defaults.artist),
            album: row.album.unwrap_or(defaults.album),
            duration_secs: row
                .duration
                .and_then(|d| u32::try_from(d).ok())
                .unwrap_or(0),
            genres: row
                .genres
                .and_then(|g| serde_json::from_str(&g).ok())
                .unwrap_or_default(),
            year: row.year.and_then(|y| i32::try_from(y).ok()),
            track_number: row.track_number.and_then(|n| u32::try_from(n).ok()),
            fingerprint_id: row.fingerprint_id,
            catalog_id: row.catalog_id,
            confidence: row.confidence.unwrap_or(0.0).clamp(0.0, 1.0) as f32,
            provenance: row
                .provenance
                .and_then(|p| p.parse().ok())
                .unwrap_or(Provenance::BaselineLookup),
            fingerprint_attempted: row.fingerprint_attempted.unwrap_or(0) != 0,
        }
    }
}

/// Key → descriptor store with age-based eviction.
///
/// The pool holds a single connection, which serializes reads and writes
/// coming from several workers.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    pool: SqlitePool,
    max_age_days: u32,
}

impl MetadataCache {
    /// Open (or create) the cache database, upgrade its schema and sweep
    /// entries older than `max_age_days`.
    pub async fn open(path: &Path, max_age_days: u32) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(format!("creating cache directory {}", dir.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(format!("opening metadata cache {}", path.display()))?;

        let cache = Self { pool, max_age_days };
        cache
            .ensure_schema()
            .await
            .with_context("upgrading metadata cache schema")?;

        match cache.purge_expired().await {
            Ok(0) => {}
            Ok(removed) => {
                tracing::info!(target: "cache", removed, "Cleaned up old cache entries")
            }
            Err(e) => tracing::warn!(target: "cache", "Cache retention sweep failed: {}", e),
        }

        Ok(cache)
    }

    /// Create the table if needed and add any columns an older database lacks.
    async fn ensure_schema(&self) -> sqlx::Result<()> {
        let columns: Vec<String> = COLUMNS
            .iter()
            .map(|(name, decl)| format!("{} {}", name, decl))
            .collect();
        let create = format!(
            "CREATE TABLE IF NOT EXISTS metadata (locator TEXT PRIMARY KEY, {})",
            columns.join(", ")
        );
        sqlx::query(&create).execute(&self.pool).await?;

        let existing: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_table_info('metadata')")
                .fetch_all(&self.pool)
                .await?;

        for (name, decl) in COLUMNS {
            if existing.iter().any(|(col,)| col == name) {
                continue;
            }
            tracing::info!(target: "cache", column = name, "Adding missing cache column");
            sqlx::query(&format!("ALTER TABLE metadata ADD COLUMN {} {}", name, decl))
                .execute(&self.pool)
                .await?;
        }

        // Rows from before the timestamp columns existed start their
        // retention window now
        let now = unix_now();
        for column in ["inserted_at", "last_accessed"] {
            sqlx::query(&format!(
                "UPDATE metadata SET {column} = ? WHERE {column} IS NULL"
            ))
            .bind(now)
            .execute(&self.pool)
            .await?;
        }

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_metadata_inserted ON metadata(inserted_at)",
            "CREATE INDEX IF NOT EXISTS idx_metadata_catalog ON metadata(catalog_id)",
            "CREATE INDEX IF NOT EXISTS idx_metadata_fingerprint ON metadata(fingerprint_id)",
        ] {
            sqlx::query(index).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Delete entries inserted before the retention window.
    ///
    /// Returns the number of removed rows.
    pub async fn purge_expired(&self) -> sqlx::Result<u64> {
        let cutoff = unix_now() - f64::from(self.max_age_days) * SECONDS_PER_DAY;
        let result = sqlx::query("DELETE FROM metadata WHERE inserted_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Look up a descriptor and refresh its last-access time.
    ///
    /// A row whose columns hold values of the wrong type is deleted and
    /// reported as a miss.
    pub async fn get(&self, locator: &str) -> sqlx::Result<Option<Descriptor>> {
        let row = sqlx::query_as::<_, CacheRow>(
            r#"
            SELECT title, artist, album, duration, genres, year, track_number,
                   fingerprint_id, catalog_id, confidence, provenance, fingerprint_attempted
            FROM metadata WHERE locator = ?
            "#,
        )
        .bind(locator)
        .fetch_optional(&self.pool)
        .await;

        let row = match row {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_))) => {
                tracing::warn!(target: "cache", locator, "Discarding corrupt cache entry: {}", e);
                sqlx::query("DELETE FROM metadata WHERE locator = ?")
                    .bind(locator)
                    .execute(&self.pool)
                    .await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        sqlx::query("UPDATE metadata SET last_accessed = ? WHERE locator = ?")
            .bind(unix_now())
            .bind(locator)
            .execute(&self.pool)
            .await?;

        Ok(Some(row.into()))
    }

    /// Insert or overwrite the descriptor for a locator, resetting both timestamps.
    pub async fn put(&self, locator: &str, descriptor: &Descriptor) -> sqlx::Result<()> {
        let now = unix_now();
        let genres = serde_json::to_string(&descriptor.genres).unwrap_or_else(|_| "[]".into());

        sqlx::query(
            r#"
            INSERT INTO metadata (
                locator, title, artist, album, duration, genres, year, track_number,
                fingerprint_id, catalog_id, confidence, provenance,
                inserted_at, last_accessed, fingerprint_attempted
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(locator) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                duration = excluded.duration,
                genres = excluded.genres,
                year = excluded.year,
                track_number = excluded.track_number,
                fingerprint_id = excluded.fingerprint_id,
                catalog_id = excluded.catalog_id,
                confidence = excluded.confidence,
                provenance = excluded.provenance,
                inserted_at = excluded.inserted_at,
                last_accessed = excluded.last_accessed,
                fingerprint_attempted = excluded.fingerprint_attempted
            "#,
        )
        .bind(locator)
        .bind(&descriptor.title)
        .bind(&descriptor.artist)
        .bind(&descriptor.album)
        .bind(i64::from(descriptor.duration_secs))
        .bind(genres)
        .bind(descriptor.year)
        .bind(descriptor.track_number.map(i64::from))
        .bind(&descriptor.fingerprint_id)
        .bind(&descriptor.catalog_id)
        .bind(f64::from(descriptor.confidence))
        .bind(descriptor.provenance.as_str())
        .bind(now)
        .bind(now)
        .bind(descriptor.fingerprint_attempted)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of cached entries.
    pub async fn len(&self) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM metadata")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
