//! Background enrichment workers.
//!
//! Each worker loops: claim an unresolved backlog item under the lock,
//! resolve it with the lock released, write the result back under the lock.
//! Idle workers sleep for the poll interval. A worker exits once loading
//! is over and nothing is left to claim, or when the stop flag is set.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::Shared;
use super::state::{Claim, Completion};
use crate::enrichment::MetadataResolver;
use crate::model::{Descriptor, ItemId};

/// Keeps the worker count and any open claim consistent however the task ends.
struct WorkerGuard {
    shared: Arc<Shared>,
    claim: Option<ItemId>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if let Some(id) = self.claim.take() {
            state.release(id);
        }
        state.worker_finished();
    }
}

pub(super) async fn run_worker(index: usize, shared: Arc<Shared>) {
    let mut guard = WorkerGuard {
        shared: shared.clone(),
        claim: None,
    };
    tracing::debug!(target: "queue::worker", worker = index, "Worker started");

    loop {
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }

        let claim = {
            let mut state = shared.state.lock();
            if state.should_worker_exit() {
                break;
            }
            state.claim_next()
        };

        let Some(claim) = claim else {
            tokio::time::sleep(shared.settings.poll_interval).await;
            continue;
        };
        guard.claim = Some(claim.id);

        let descriptor = resolve_guarded(
            shared.resolver.as_ref(),
            &claim,
            shared.settings.resolve_timeout,
        )
        .await;

        if shared.stop.load(Ordering::SeqCst) {
            // Guard releases the claim
            break;
        }

        let completion = shared.state.lock().complete(claim.id, descriptor);
        guard.claim = None;
        match completion {
            Completion::Ready => {
                tracing::debug!(target: "queue::worker", worker = index, locator = %claim.locator, "Ready for playback")
            }
            Completion::Backlog => {
                tracing::debug!(target: "queue::worker", worker = index, locator = %claim.locator, "Resolved, kept in backlog")
            }
            Completion::Discarded => {
                tracing::debug!(target: "queue::worker", worker = index, locator = %claim.locator, "Item already played, result discarded")
            }
        }
    }

    tracing::debug!(target: "queue::worker", worker = index, "Worker finished");
}

/// Run the resolver with a time limit, turning panics and timeouts into
/// the failed baseline descriptor.
pub(super) async fn resolve_guarded(
    resolver: &dyn MetadataResolver,
    claim: &Claim,
    limit: Duration,
) -> Descriptor {
    let call = AssertUnwindSafe(resolver.resolve(&claim.locator, claim.hint.as_ref())).catch_unwind();

    match tokio::time::timeout(limit, call).await {
        Ok(Ok(descriptor)) => descriptor,
        Ok(Err(_)) => {
            tracing::error!(target: "queue::worker", locator = %claim.locator, "Resolver panicked");
            Descriptor::failed(claim.hint.as_ref())
        }
        Err(_) => {
            tracing::warn!(target: "queue::worker", locator = %claim.locator, ?limit, "Resolver timed out");
            Descriptor::failed(claim.hint.as_ref())
        }
    }
}
