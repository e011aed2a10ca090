//! Local collection scanner.
//!
//! Walks the configured tier directories, builds one ready-to-play
//! [`QueueItem`] per audio file and orders them for the local queue:
//! descending priority, random order within a tier.

use futures::StreamExt;
use futures::stream::Stream;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::cache::MetadataCache;
use crate::model::{Descriptor, Provenance, QueueItem, UNKNOWN_ALBUM, UNKNOWN_ARTIST};

/// Priority of files outside every configured tier root.
pub const DEFAULT_PRIORITY: i32 = 1;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "wav", "m4a"];

/// A priority tier rooted at a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub priority: i32,
    pub root: PathBuf,
}

/// Turn the `[library] tiers` table into tiers, skipping non-numeric labels.
pub fn parse_tiers(table: &BTreeMap<String, PathBuf>) -> Vec<Tier> {
    let mut tiers = Vec::with_capacity(table.len());
    for (label, root) in table {
        match label.trim().parse::<i32>() {
            Ok(priority) => tiers.push(Tier {
                priority,
                root: root.clone(),
            }),
            Err(_) => {
                tracing::warn!(target: "scanner", label = %label, "Ignoring non-numeric tier label")
            }
        }
    }
    tiers
}

/// Priority of the most specific tier root containing `path`.
pub fn priority_for(path: &Path, tiers: &[Tier]) -> i32 {
    tiers
        .iter()
        .filter(|t| path.starts_with(&t.root))
        .max_by_key(|t| t.root.components().count())
        .map(|t| t.priority)
        .unwrap_or(DEFAULT_PRIORITY)
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Scans the given root directory recursively for audio files.
///
/// Unreadable entries are skipped. Returns a Stream of PathBufs.
pub fn scan(root: PathBuf) -> impl Stream<Item = PathBuf> {
    let (tx, rx) = mpsc::channel(100);

    // Blocking traversal on its own thread
    tokio::task::spawn_blocking(move || {
        for entry in WalkDir::new(&root).into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(target: "scanner", "Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && is_audio_file(entry.path()) {
                // Receiver dropped: stop scanning
                if tx.blocking_send(entry.into_path()).is_err() {
                    break;
                }
            }
        }
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|path| (path, rx))
    })
}

/// Guess a descriptor from an "Artist - Title.ext" file name.
///
/// The parent directory name stands in for the album.
pub fn baseline_from_filename(path: &Path) -> Descriptor {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (artist, title) = match stem.split_once(" - ") {
        Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
            (artist.trim().to_string(), title.trim().to_string())
        }
        _ => (UNKNOWN_ARTIST.to_string(), stem.trim().to_string()),
    };

    let album = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());

    Descriptor {
        title,
        artist,
        album,
        provenance: Provenance::BaselineLookup,
        ..Default::default()
    }
}

/// Scan every tier directory and build local queue items.
///
/// Missing directories are logged and skipped. Files reachable through
/// nested tier roots are only ingested once.
pub async fn scan_local(tiers: &[Tier], cache: Option<&MetadataCache>) -> Vec<QueueItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for tier in tiers {
        if !tier.root.is_dir() {
            tracing::warn!(target: "scanner", root = %tier.root.display(), "Tier directory not found, skipping");
            continue;
        }

        let mut stream = Box::pin(scan(tier.root.clone()));
        while let Some(path) = stream.next().await {
            if !seen.insert(path.clone()) {
                continue;
            }
            let locator = path.to_string_lossy().into_owned();

            let cached = match cache {
                Some(cache) => match cache.get(&locator).await {
                    Ok(hit) => hit,
                    Err(e) => {
                        tracing::warn!(target: "scanner", "Cache lookup failed for {}: {}", locator, e);
                        None
                    }
                },
                None => None,
            };
            let descriptor = cached.unwrap_or_else(|| baseline_from_filename(&path));

            items.push(QueueItem::local(locator, descriptor, priority_for(&path, tiers)));
        }
    }

    tracing::info!(target: "scanner", count = items.len(), "Local scan complete");
    items
}

/// Sort by descending priority with a random order inside each tier.
pub fn order_by_priority<R: Rng + ?Sized>(items: &mut [QueueItem], rng: &mut R) {
    items.shuffle(rng);
    // Stable sort keeps the shuffled order within equal priorities
    items.sort_by(|a, b| b.priority.cmp(&a.priority));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_descriptor, temp_cache};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::fs::File;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_scan_audio_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        File::create(root.join("song.mp3")).unwrap();
        File::create(root.join("music.flac")).unwrap();
        File::create(root.join("notes.txt")).unwrap();
        File::create(root.join("image.png")).unwrap();
        File::create(root.join("UPPERCASE.OGG")).unwrap();

        let subdir = root.join("subdir");
        std::fs::create_dir(&subdir).unwrap();
        File::create(subdir.join("track.wav")).unwrap();
        File::create(subdir.join("ignore.doc")).unwrap();

        let paths: Vec<PathBuf> = scan(root.to_path_buf()).collect().await;
        assert_eq!(paths.len(), 4);

        let file_names: Vec<String> = paths
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(|s| s.to_string()))
            .collect();
        assert!(file_names.contains(&"song.mp3".to_string()));
        assert!(file_names.contains(&"UPPERCASE.OGG".to_string()));
        assert!(file_names.contains(&"track.wav".to_string()));
        assert!(!file_names.contains(&"notes.txt".to_string()));
    }

    #[test]
    fn test_baseline_from_filename() {
        let d = baseline_from_filename(Path::new("/music/Abbey Road/The Beatles - Something.mp3"));
        assert_eq!(d.artist, "The Beatles");
        assert_eq!(d.title, "Something");
        assert_eq!(d.album, "Abbey Road");
        assert_eq!(d.provenance, Provenance::BaselineLookup);

        let bare = baseline_from_filename(Path::new("/music/misc/untitled.flac"));
        assert_eq!(bare.artist, UNKNOWN_ARTIST);
        assert_eq!(bare.title, "untitled");
        assert_eq!(bare.album, "misc");
    }

    #[test]
    fn test_priority_uses_most_specific_root() {
        let tiers = vec![
            Tier { priority: 2, root: PathBuf::from("/music") },
            Tier { priority: 4, root: PathBuf::from("/music/favorites") },
        ];
        assert_eq!(priority_for(Path::new("/music/favorites/a.mp3"), &tiers), 4);
        assert_eq!(priority_for(Path::new("/music/other/b.mp3"), &tiers), 2);
        assert_eq!(priority_for(Path::new("/elsewhere/c.mp3"), &tiers), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_parse_tiers_skips_bad_labels() {
        let mut table = BTreeMap::new();
        table.insert("3".to_string(), PathBuf::from("/a"));
        table.insert("best".to_string(), PathBuf::from("/b"));
        let tiers = parse_tiers(&table);
        assert_eq!(tiers, vec![Tier { priority: 3, root: PathBuf::from("/a") }]);
    }

    #[tokio::test]
    async fn test_scan_local_assigns_tiers_and_dedups() {
        let dir = tempdir().unwrap();
        let top = dir.path().join("all");
        let fav = top.join("fav");
        std::fs::create_dir_all(&fav).unwrap();
        File::create(top.join("A - One.mp3")).unwrap();
        File::create(fav.join("B - Two.mp3")).unwrap();

        let tiers = vec![
            Tier { priority: 1, root: top.clone() },
            Tier { priority: 3, root: fav.clone() },
            Tier { priority: 2, root: dir.path().join("missing") },
        ];
        let items = scan_local(&tiers, None).await;

        assert_eq!(items.len(), 2);
        let two = items.iter().find(|i| i.locator.ends_with("B - Two.mp3")).unwrap();
        assert_eq!(two.priority, 3);
        assert!(two.descriptor_ready);
        assert_eq!(two.descriptor.as_ref().unwrap().artist, "B");
    }

    #[tokio::test]
    async fn test_scan_local_prefers_cached_descriptor() {
        let (cache, _cache_dir) = temp_cache().await;
        let dir = tempdir().unwrap();
        let path = dir.path().join("whatever.mp3");
        File::create(&path).unwrap();
        cache
            .put(&path.to_string_lossy(), &mock_descriptor())
            .await
            .unwrap();

        let tiers = vec![Tier { priority: 1, root: dir.path().to_path_buf() }];
        let items = scan_local(&tiers, Some(&cache)).await;
        assert_eq!(items[0].descriptor, Some(mock_descriptor()));
    }

    #[test]
    fn test_order_by_priority() {
        let mut items: Vec<QueueItem> = [1, 3, 2, 3, 1, 2]
            .iter()
            .enumerate()
            .map(|(i, p)| QueueItem::local(format!("/m/{}.mp3", i), Descriptor::default(), *p))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);
        order_by_priority(&mut items, &mut rng);

        let priorities: Vec<i32> = items.iter().map(|i| i.priority).collect();
        assert_eq!(priorities, vec![3, 3, 2, 2, 1, 1]);
    }
}
