//! The playback loop and the interactive session chooser.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::warn;

use crate::cache::MetadataCache;
use crate::config::Config;
use crate::enrichment::{
    MusicBrainzClient, ResolverSettings, TextSearchApi, TieredResolver, YtDlp,
};
use crate::model::QueueItem;
use crate::player::Player;
use crate::queue::{QueueManager, QueueSettings, StatsSnapshot};
use crate::scanner;
use crate::session::{
    AlwaysNew, ResumeLatest, Session, SessionChoice, SessionChooser, SessionStore,
};

/// How many older sessions the console chooser lists.
const MAX_LISTED_SESSIONS: usize = 9;

#[derive(Debug, Clone, Copy, Default)]
pub struct PlayOptions {
    pub fresh: bool,
    pub resume_latest: bool,
    pub dry_run: bool,
}

/// Build the queue and play until it runs dry or Ctrl+C is pressed.
pub fn cmd_play(rt: &Runtime, config: &Config, options: PlayOptions) -> anyhow::Result<()> {
    rt.block_on(async {
        let cache = match MetadataCache::open(&config.cache.resolved_path(), config.cache.max_age_days).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(target: "cli::play", "Metadata cache unavailable, continuing without: {}", e);
                None
            }
        };
        let sessions = Arc::new(SessionStore::open(config.sessions.resolved_dir())?);

        let ytdlp = Arc::new(YtDlp::new(config.remote.ytdlp_program.clone()));
        let text_search: Option<Arc<dyn TextSearchApi>> = if config.enrichment.text_search {
            match MusicBrainzClient::new() {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!(target: "cli::play", "Text search disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };
        let resolver = Arc::new(TieredResolver::new(
            cache.clone(),
            ytdlp.clone(),
            text_search,
            ResolverSettings::from(&config.enrichment),
        ));

        let mut settings = QueueSettings::from_config(config);
        let chooser: Box<dyn SessionChooser> = if options.fresh {
            // Nothing is recent enough to auto-resume
            settings.auto_resume_hours = 0.0;
            Box::new(AlwaysNew)
        } else if options.resume_latest {
            Box::new(ResumeLatest)
        } else {
            Box::new(ConsoleChooser)
        };
        let poll_interval = settings.poll_interval;

        let mut manager = QueueManager::new(settings, resolver, ytdlp, sessions)
            .with_tiers(scanner::parse_tiers(&config.library.tiers))
            .with_sources(config.remote.sources.clone())
            .with_chooser(chooser);
        if let Some(cache) = cache {
            manager = manager.with_cache(cache);
        }

        manager.initialize().await;
        let stats = manager.stats();
        println!(
            "Queue ready: {} local, {} remote. Press Ctrl+C to stop.\n",
            stats.local_found, stats.remote_loaded
        );

        let player = Player::from_config(&config.player);
        loop {
            let item = match manager.next_item() {
                Some(item) => item,
                None => {
                    let stats = manager.stats();
                    if stats.is_exhausted() && !stats.enriching {
                        println!("\nQueue finished.");
                        break;
                    }
                    if interrupted_within(poll_interval).await {
                        break;
                    }
                    continue;
                }
            };

            print_now_playing(&item, &manager.stats());
            if options.dry_run {
                continue;
            }

            tokio::select! {
                result = player.play(&item) => {
                    if let Err(e) = result {
                        eprintln!("  {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        println!("\nStopping...");
        manager.shutdown().await;
        Ok::<(), anyhow::Error>(())
    })
}

/// Sleep for `period`, returning early with `true` on Ctrl+C.
async fn interrupted_within(period: Duration) -> bool {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = tokio::time::sleep(period) => false,
    }
}

fn print_now_playing(item: &QueueItem, stats: &StatsSnapshot) {
    let duration = item
        .descriptor
        .as_ref()
        .map(|d| d.format_duration())
        .unwrap_or_else(|| "--:--".to_string());

    println!("> [{}] {} ({})", item.source.as_str(), item.display_title(), duration);
    println!(
        "  buffer {} ({}/{} ready) | {} remaining",
        stats.buffer_health(),
        stats.ready_buffer,
        stats.ready_capacity,
        stats.total_remaining()
    );
}

/// Asks on the terminal which older session to resume.
pub struct ConsoleChooser;

impl SessionChooser for ConsoleChooser {
    fn choose(&self, candidates: &[Session]) -> SessionChoice {
        let shown = &candidates[..candidates.len().min(MAX_LISTED_SESSIONS)];

        println!("\nPrevious sessions:");
        for (i, session) in shown.iter().enumerate() {
            println!("  {}. {}", i + 1, session.summary());
        }
        println!("  n. Start a new session");
        print!("Choose [1-{}/n]: ", shown.len());
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return SessionChoice::Cancel;
        }
        parse_choice(line.trim(), shown)
    }
}

fn parse_choice(input: &str, candidates: &[Session]) -> SessionChoice {
    match input {
        "" | "n" | "N" => SessionChoice::New,
        other => match other.parse::<usize>() {
            Ok(n) if (1..=candidates.len()).contains(&n) => {
                SessionChoice::Resume(candidates[n - 1].session_id.clone())
            }
            _ => SessionChoice::Cancel,
        },
    }
}
