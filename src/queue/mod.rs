//! Prefetching queue manager.
//!
//! Blends local files and remote items into one playback stream:
//! - local items are scanned once and always played first
//! - remote items come from a resumed or freshly created session
//! - a small pool of workers enriches remote items in the background,
//!   filling a bounded ready buffer
//!
//! All three collections live in one [`QueueState`] behind one mutex.
//! Resolver calls and session writes happen outside that lock.
//!
//! # Example
//!
//! ```ignore
//! let manager = QueueManager::new(settings, resolver, catalog, sessions)
//!     .with_tiers(tiers)
//!     .with_sources(sources);
//! manager.initialize().await;
//! while let Some(item) = manager.next_item() {
//!     play(&item).await;
//! }
//! manager.shutdown().await;
//! ```

mod state;
mod stats;
mod worker;

pub use stats::{BufferHealth, StatsSnapshot};

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cache::MetadataCache;
use crate::config::Config;
use crate::enrichment::ytdlp::dedup_locators;
use crate::enrichment::{MetadataResolver, RemoteCatalog};
use crate::model::{QueueItem, SourceKind};
use crate::scanner::{self, Tier};
use crate::session::{AlwaysNew, SessionChooser, SessionPlan, SessionStore, plan_session};
use state::QueueState;

/// Hard cap on background workers.
pub const MAX_WORKERS: usize = 3;

/// How long `shutdown` waits for each worker before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Queue tuning, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub max_workers: usize,
    pub ready_capacity: usize,
    pub confidence_threshold: f32,
    pub poll_interval: Duration,
    pub resolve_timeout: Duration,
    pub auto_resume_hours: f64,
    pub session_max_age_days: u32,
    pub keep_recent_sessions: usize,
}

impl QueueSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.enrichment.max_workers,
            ready_capacity: config.enrichment.ready_buffer_capacity,
            confidence_threshold: config.enrichment.confidence_threshold,
            poll_interval: config.enrichment.poll_interval(),
            resolve_timeout: config.enrichment.resolve_timeout(),
            auto_resume_hours: config.sessions.auto_resume_hours,
            session_max_age_days: config.sessions.max_age_days,
            keep_recent_sessions: config.sessions.keep_recent,
        }
    }

    /// Workers actually spawned: between 1 and [`MAX_WORKERS`].
    pub fn worker_count(&self) -> usize {
        self.max_workers.clamp(1, MAX_WORKERS)
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// State shared with the workers.
pub(crate) struct Shared {
    state: Mutex<QueueState>,
    stop: AtomicBool,
    resolver: Arc<dyn MetadataResolver>,
    settings: QueueSettings,
}

pub struct QueueManager {
    shared: Arc<Shared>,
    sessions: Arc<SessionStore>,
    cache: Option<MetadataCache>,
    catalog: Arc<dyn RemoteCatalog>,
    chooser: Box<dyn SessionChooser>,
    tiers: Vec<Tier>,
    sources: Vec<String>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl QueueManager {
    pub fn new(
        settings: QueueSettings,
        resolver: Arc<dyn MetadataResolver>,
        catalog: Arc<dyn RemoteCatalog>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let state = QueueState::new(settings.ready_capacity, settings.confidence_threshold);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                stop: AtomicBool::new(false),
                resolver,
                settings,
            }),
            sessions,
            cache: None,
            catalog,
            chooser: Box::new(AlwaysNew),
            tiers: Vec::new(),
            sources: Vec::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Cache consulted by the local scan.
    pub fn with_cache(mut self, cache: MetadataCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_tiers(mut self, tiers: Vec<Tier>) -> Self {
        self.tiers = tiers;
        self
    }

    /// Remote catalog sources listed when starting a fresh session.
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    /// Decides between older sessions when none qualifies for auto-resume.
    pub fn with_chooser(mut self, chooser: Box<dyn SessionChooser>) -> Self {
        self.chooser = chooser;
        self
    }

    /// Scan local files, start the workers and load the remote backlog.
    ///
    /// Returns whether any local items were found. Failures along the way
    /// are logged and only shrink the queue.
    pub async fn initialize(&self) -> bool {
        let mut local = scanner::scan_local(&self.tiers, self.cache.as_ref()).await;
        {
            let mut rng = rand::rng();
            scanner::order_by_priority(&mut local, &mut rng);
        }
        let has_local = !local.is_empty();
        self.shared.state.lock().load_local(local);

        self.spawn_workers();

        self.sessions.cleanup(
            self.shared.settings.session_max_age_days,
            self.shared.settings.keep_recent_sessions,
        );

        let plan = plan_session(
            &self.sessions,
            self.shared.settings.auto_resume_hours,
            self.chooser.as_ref(),
        );
        let (locators, total) = match plan {
            SessionPlan::Resume(session) => {
                (session.remaining_locators().to_vec(), session.total_songs)
            }
            SessionPlan::Fresh => {
                let locators = self.fetch_catalog().await;
                if locators.is_empty() {
                    tracing::warn!(target: "queue", "No remote items available, playing local files only");
                    (Vec::new(), 0)
                } else {
                    let session = self.sessions.create_session(locators, None);
                    let total = session.total_songs;
                    (session.locators, total)
                }
            }
        };

        let stats = {
            let mut state = self.shared.state.lock();
            state.load_backlog(locators, total);
            state.snapshot()
        };
        tracing::info!(
            target: "queue",
            local = stats.local_found,
            remote = stats.remote_loaded,
            workers = self.shared.settings.worker_count(),
            "Queue initialized"
        );

        has_local
    }

    /// List every source, de-duplicate and shuffle.
    async fn fetch_catalog(&self) -> Vec<String> {
        let mut listings = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match self.catalog.fetch(source).await {
                Ok(locators) => {
                    tracing::info!(target: "queue", source = %source, count = locators.len(), "Fetched remote catalog");
                    listings.push(locators);
                }
                Err(e) => {
                    tracing::warn!(target: "queue", source = %source, "Catalog fetch failed: {}", e)
                }
            }
        }

        let mut locators = dedup_locators(listings);
        locators.shuffle(&mut rand::rng());
        locators
    }

    fn spawn_workers(&self) {
        let count = self.shared.settings.worker_count();
        let mut workers = self.workers.lock();
        for index in 0..count {
            self.shared.state.lock().worker_started();
            let shared = self.shared.clone();
            workers.push(tokio::spawn(worker::run_worker(index, shared)));
        }
    }

    /// Hand out the next item to play, or `None` if nothing is available yet.
    ///
    /// Never blocks on enrichment. Each hand-out records the session offset.
    pub fn next_item(&self) -> Option<QueueItem> {
        let dequeued = self.shared.state.lock().next_item()?;
        let item = dequeued.item;

        let current = (item.source == SourceKind::Remote).then_some(item.locator.as_str());
        if let Err(e) = self.sessions.update_progress(dequeued.progress, current) {
            tracing::warn!(target: "queue", "Failed to persist session progress: {}", e);
        }

        tracing::debug!(target: "queue", source = item.source.as_str(), "Dequeued {}", item.display_title());
        Some(item)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.state.lock().snapshot()
    }

    /// Stop the workers. In-flight resolutions get a short grace period,
    /// after which they are aborted and their results dropped.
    pub async fn shutdown(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());

        for mut handle in handles {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                tracing::debug!(target: "queue", "Aborting worker still resolving");
                handle.abort();
                // Wait for the cancelled task to drop its claim
                let _ = handle.await;
            }
        }
        tracing::info!(target: "queue", "Queue shut down");
    }
}

impl Drop for QueueManager {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        for handle in self.workers.lock().drain(..) {
            handle.abort();
        }
    }
}
