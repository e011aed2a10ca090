//! Metadata cache maintenance.

use tokio::runtime::Runtime;

use crate::cache::MetadataCache;
use crate::config::Config;

pub fn cmd_cache_stats(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    let path = config.cache.resolved_path();
    rt.block_on(async {
        let cache = MetadataCache::open(&path, config.cache.max_age_days).await?;
        let entries = cache.len().await?;
        println!("Cache: {}", path.display());
        println!("Entries: {}", entries);
        println!("Retention: {} days", config.cache.max_age_days);
        Ok::<(), anyhow::Error>(())
    })
}

/// Run the retention sweep now.
pub fn cmd_cache_purge(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    let path = config.cache.resolved_path();
    rt.block_on(async {
        let cache = MetadataCache::open(&path, config.cache.max_age_days).await?;
        let removed = cache.purge_expired().await?;
        println!("Removed {} expired entries", removed);
        Ok::<(), anyhow::Error>(())
    })
}
