//! The three queue collections and every transition between them.
//!
//! `QueueState` is plain data; [`super::QueueManager`] keeps it behind a
//! single mutex, so each method here is one atomic step. An item lives in
//! exactly one of `local`, `backlog` or `ready` until it is handed out.

use std::collections::VecDeque;

use super::stats::StatsSnapshot;
use crate::model::{Descriptor, ItemId, Provenance, QueueItem};

/// A backlog item claimed by a worker.
#[derive(Debug, Clone)]
pub struct Claim {
    pub id: ItemId,
    pub locator: String,
    pub hint: Option<Descriptor>,
}

/// Where a completed item ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Moved into the ready buffer
    Ready,
    /// Resolved but left in the backlog
    Backlog,
    /// The item was handed out while in flight; result dropped
    Discarded,
}

/// An item leaving the queue.
#[derive(Debug, Clone)]
pub struct Dequeued {
    pub item: QueueItem,
    /// Session offset after this hand-out
    pub progress: usize,
}

#[derive(Debug, Default)]
struct Counters {
    local_found: usize,
    remote_loaded: usize,
    enriched: usize,
    fingerprint_matched: usize,
    dequeued: usize,
}

#[derive(Debug)]
pub struct QueueState {
    local: VecDeque<QueueItem>,
    backlog: VecDeque<QueueItem>,
    ready: VecDeque<QueueItem>,
    /// Preferred backlog items that found the ready buffer full, in
    /// completion order
    waiting: VecDeque<ItemId>,
    ready_capacity: usize,
    confidence_threshold: f32,
    next_id: ItemId,
    session_total: usize,
    loading: bool,
    active_workers: usize,
    counters: Counters,
}

impl QueueState {
    pub fn new(ready_capacity: usize, confidence_threshold: f32) -> Self {
        Self {
            local: VecDeque::new(),
            backlog: VecDeque::new(),
            ready: VecDeque::new(),
            waiting: VecDeque::new(),
            ready_capacity: ready_capacity.max(1),
            confidence_threshold,
            next_id: 1,
            session_total: 0,
            loading: true,
            active_workers: 0,
            counters: Counters::default(),
        }
    }

    fn assign_id(&mut self, item: &mut QueueItem) {
        item.id = self.next_id;
        self.next_id += 1;
    }

    /// Append pre-ordered local items.
    pub fn load_local(&mut self, items: Vec<QueueItem>) {
        self.counters.local_found += items.len();
        for mut item in items {
            self.assign_id(&mut item);
            self.local.push_back(item);
        }
    }

    /// Fill the backlog and end the loading phase.
    ///
    /// `session_total` is the full session length, which may exceed
    /// `locators.len()` when resuming part-way.
    pub fn load_backlog(&mut self, locators: Vec<String>, session_total: usize) {
        self.counters.remote_loaded += locators.len();
        self.session_total = session_total.max(locators.len());
        for locator in locators {
            let mut item = QueueItem::remote(locator);
            self.assign_id(&mut item);
            self.backlog.push_back(item);
        }
        self.loading = false;
    }

    pub fn worker_started(&mut self) {
        self.active_workers += 1;
    }

    pub fn worker_finished(&mut self) {
        self.active_workers = self.active_workers.saturating_sub(1);
    }

    /// A worker may stop once loading is over and nothing is left to claim.
    pub fn should_worker_exit(&self) -> bool {
        !self.loading && !self.backlog.iter().any(QueueItem::is_claimable)
    }

    /// Claim the first unresolved, unclaimed backlog item.
    pub fn claim_next(&mut self) -> Option<Claim> {
        let item = self.backlog.iter_mut().find(|i| i.is_claimable())?;
        item.enrichment_in_flight = true;
        Some(Claim {
            id: item.id,
            locator: item.locator.clone(),
            hint: item.descriptor.clone(),
        })
    }

    /// Store a worker's result and route the item.
    pub fn complete(&mut self, id: ItemId, descriptor: Descriptor) -> Completion {
        let Some(pos) = self.backlog.iter().position(|i| i.id == id) else {
            return Completion::Discarded;
        };

        self.counters.enriched += 1;
        if descriptor.provenance == Provenance::FingerprintMatch {
            self.counters.fingerprint_matched += 1;
        }
        let preferred = descriptor.is_preferred(self.confidence_threshold);

        let item = &mut self.backlog[pos];
        item.descriptor = Some(descriptor);
        item.descriptor_ready = true;
        item.enrichment_in_flight = false;
        item.enrichment_attempted = true;

        if !preferred {
            return Completion::Backlog;
        }
        if self.ready.len() < self.ready_capacity {
            if let Some(item) = self.backlog.remove(pos) {
                self.ready.push_back(item);
                return Completion::Ready;
            }
        }
        self.waiting.push_back(id);
        Completion::Backlog
    }

    /// Give a claim back without a result.
    pub fn release(&mut self, id: ItemId) {
        if let Some(item) = self.backlog.iter_mut().find(|i| i.id == id) {
            item.enrichment_in_flight = false;
        }
    }

    /// Fill free ready slots with waiting items, earliest completion first.
    fn promote_waiting(&mut self) {
        while self.ready.len() < self.ready_capacity {
            let Some(id) = self.waiting.pop_front() else {
                break;
            };
            if let Some(pos) = self.backlog.iter().position(|i| i.id == id) {
                if let Some(item) = self.backlog.remove(pos) {
                    self.ready.push_back(item);
                }
            }
        }
    }

    /// Hand out the next item: local first, then ready, then the backlog.
    ///
    /// Never waits. The backlog fallback returns an unresolved head rather
    /// than nothing.
    pub fn next_item(&mut self) -> Option<Dequeued> {
        let item = if let Some(item) = self.local.pop_front() {
            item
        } else if let Some(item) = self.ready.pop_front() {
            self.promote_waiting();
            item
        } else {
            let pos = self
                .backlog
                .iter()
                .position(|i| i.descriptor_ready && !i.enrichment_in_flight)
                .unwrap_or(0);
            self.backlog.remove(pos)?
        };

        self.counters.dequeued += 1;
        let progress = self
            .session_total
            .saturating_sub(self.backlog.len() + self.ready.len());
        Some(Dequeued { item, progress })
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            local_found: self.counters.local_found,
            local_remaining: self.local.len(),
            remote_loaded: self.counters.remote_loaded,
            backlog_remaining: self.backlog.len(),
            backlog_unresolved: self.backlog.iter().filter(|i| i.is_claimable()).count(),
            in_flight: self
                .backlog
                .iter()
                .filter(|i| i.enrichment_in_flight)
                .count(),
            ready_buffer: self.ready.len(),
            ready_capacity: self.ready_capacity,
            enriched: self.counters.enriched,
            fingerprint_matched: self.counters.fingerprint_matched,
            dequeued: self.counters.dequeued,
            loading: self.loading,
            enriching: self.active_workers > 0,
            session_total: self.session_total,
        }
    }

    /// Local items never sit in the backlog or ready buffer.
    #[cfg(test)]
    fn sources_are_separated(&self) -> bool {
        use crate::model::SourceKind;
        self.local.iter().all(|i| i.source == SourceKind::Local)
            && self
                .backlog
                .iter()
                .chain(self.ready.iter())
                .all(|i| i.source == SourceKind::Remote)
    }
}
