//! Local library preview.

use std::collections::BTreeMap;
use tokio::runtime::Runtime;
use tracing::warn;

use crate::cache::MetadataCache;
use crate::config::Config;
use crate::scanner;

/// Scan the configured tiers and print the local queue in play order.
pub fn cmd_scan(rt: &Runtime, config: &Config, limit: usize) -> anyhow::Result<()> {
    let tiers = scanner::parse_tiers(&config.library.tiers);
    if tiers.is_empty() {
        println!("No library tiers configured. Add a [library.tiers] table to the config file.");
        return Ok(());
    }

    rt.block_on(async {
        let cache = match MetadataCache::open(&config.cache.resolved_path(), config.cache.max_age_days).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(target: "cli::scan", "Metadata cache unavailable: {}", e);
                None
            }
        };

        let mut items = scanner::scan_local(&tiers, cache.as_ref()).await;
        scanner::order_by_priority(&mut items, &mut rand::rng());

        let mut per_tier: BTreeMap<i32, usize> = BTreeMap::new();
        for item in &items {
            *per_tier.entry(item.priority).or_default() += 1;
        }

        println!("Found {} local files", items.len());
        for (priority, count) in per_tier.iter().rev() {
            println!("  priority {}: {} files", priority, count);
        }
        println!();

        for (i, item) in items.iter().take(limit).enumerate() {
            println!("{:>4}. [p{}] {}", i + 1, item.priority, item.display_title());
        }
        if items.len() > limit {
            println!("  ... and {} more", items.len() - limit);
        }
    });
    Ok(())
}
