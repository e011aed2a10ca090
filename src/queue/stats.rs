//! Point-in-time queue statistics for the presentation layer.

use std::fmt;

/// Ready items needed for each buffer health level.
const EXCELLENT_READY: usize = 5;
const GOOD_READY: usize = 2;

/// Counts taken atomically under the queue lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Local items ingested at startup
    pub local_found: usize,
    pub local_remaining: usize,
    /// Remote items ingested into the backlog
    pub remote_loaded: usize,
    pub backlog_remaining: usize,
    /// Backlog items not yet resolved and not claimed
    pub backlog_unresolved: usize,
    /// Items currently owned by a worker
    pub in_flight: usize,
    pub ready_buffer: usize,
    pub ready_capacity: usize,
    /// Resolutions written back
    pub enriched: usize,
    pub fingerprint_matched: usize,
    /// Items handed out by `next_item`
    pub dequeued: usize,
    /// Initial backlog load still running
    pub loading: bool,
    /// At least one worker is still running
    pub enriching: bool,
    pub session_total: usize,
}

impl StatsSnapshot {
    pub fn total_remaining(&self) -> usize {
        self.local_remaining + self.backlog_remaining + self.ready_buffer
    }

    /// Nothing left to hand out and nothing more coming.
    pub fn is_exhausted(&self) -> bool {
        self.total_remaining() == 0 && !self.loading
    }

    pub fn buffer_health(&self) -> BufferHealth {
        match self.ready_buffer {
            n if n >= EXCELLENT_READY => BufferHealth::Excellent,
            n if n >= GOOD_READY => BufferHealth::Good,
            _ => BufferHealth::Low,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "local {}/{} | ready {}/{} ({}) | backlog {} ({} unresolved, {} in flight) | enriched {}",
            self.local_remaining,
            self.local_found,
            self.ready_buffer,
            self.ready_capacity,
            self.buffer_health(),
            self.backlog_remaining,
            self.backlog_unresolved,
            self.in_flight,
            self.enriched
        )?;
        if self.loading {
            write!(f, " | loading")?;
        }
        Ok(())
    }
}

/// Coarse indicator of how far enrichment is ahead of playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferHealth {
    Excellent,
    Good,
    Low,
}

impl fmt::Display for BufferHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BufferHealth::Excellent => "excellent",
            BufferHealth::Good => "good",
            BufferHealth::Low => "low",
        })
    }
}
