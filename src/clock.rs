//! Shared clock — server-aligned time for every client.
//!
//! DESIGN
//! ======
//! `now()` is local time plus the offset most recently measured by the
//! timesync loop. The offset lives in atomics so `now()` never blocks and can
//! be called from any branch of the player loop at any rate.
//!
//! Offset updates are fanned out on a broadcast channel. Consumers subscribe
//! with a threshold and only see changes larger than it.
//!
//! FAILURE MODE
//! ============
//! Until the first successful exchange the offset is zero, so `now()` is
//! plain local time. After a failed exchange the last good offset is kept.
//! Neither case is an error: callers get reduced accuracy, not a failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{info, warn};

const CHANGE_CHANNEL_CAPACITY: usize = 32;

// =============================================================================
// LOCAL TIME
// =============================================================================

/// Source of device-local wall time in epoch milliseconds.
pub trait LocalClock: Send + Sync + 'static {
    fn now_ms(&self) -> i64;
}

/// Wall clock anchored at construction and advanced by the monotonic tokio
/// clock, so it never jumps backwards when the OS clock is adjusted.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch_ms: i64,
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self { epoch_ms: frames::now_ms(), origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalClock for SystemClock {
    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.epoch_ms.saturating_add(elapsed)
    }
}

// =============================================================================
// OFFSET CHANGES
// =============================================================================

/// One offset update as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetChange {
    pub previous_ms: i64,
    pub current_ms: i64,
    pub magnitude_ms: i64,
}

/// Receiver half of [`SharedClock::subscribe`], filtered by threshold.
pub struct OffsetWatcher {
    rx: broadcast::Receiver<OffsetChange>,
    threshold_ms: i64,
}

impl OffsetWatcher {
    /// Wait for the next change whose magnitude exceeds the threshold.
    ///
    /// Returns `None` once the clock has been dropped. Cancel safe.
    pub async fn changed(&mut self) -> Option<OffsetChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.magnitude_ms > self.threshold_ms => return Some(change),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// =============================================================================
// SHARED CLOCK
// =============================================================================

struct ClockInner {
    local: Arc<dyn LocalClock>,
    offset_ms: AtomicI64,
    last_change_ms: AtomicI64,
    synced: AtomicBool,
    changes: broadcast::Sender<OffsetChange>,
}

/// Process-wide estimate of server time. Cheap to clone.
#[derive(Clone)]
pub struct SharedClock {
    inner: Arc<ClockInner>,
}

impl SharedClock {
    #[must_use]
    pub fn new(local: Arc<dyn LocalClock>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ClockInner {
                local,
                offset_ms: AtomicI64::new(0),
                last_change_ms: AtomicI64::new(0),
                synced: AtomicBool::new(false),
                changes,
            }),
        }
    }

    /// Shared clock over [`SystemClock`].
    #[must_use]
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock::new()))
    }

    /// Estimated server time in epoch milliseconds.
    #[must_use]
    pub fn now(&self) -> i64 {
        self.local_now().saturating_add(self.offset_ms())
    }

    /// Unadjusted device time in epoch milliseconds.
    #[must_use]
    pub fn local_now(&self) -> i64 {
        self.inner.local.now_ms()
    }

    #[must_use]
    pub fn offset_ms(&self) -> i64 {
        self.inner.offset_ms.load(Ordering::Acquire)
    }

    /// Magnitude of the most recent offset update.
    #[must_use]
    pub fn last_offset_change_magnitude(&self) -> i64 {
        self.inner.last_change_ms.load(Ordering::Acquire)
    }

    /// Whether the latest exchange succeeded.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.inner.synced.load(Ordering::Acquire)
    }

    /// Record a freshly measured offset and notify subscribers.
    pub fn apply_offset(&self, offset_ms: i64) -> OffsetChange {
        let previous_ms = self.inner.offset_ms.swap(offset_ms, Ordering::AcqRel);
        let magnitude_ms = offset_ms.saturating_sub(previous_ms).saturating_abs();
        self.inner.last_change_ms.store(magnitude_ms, Ordering::Release);

        if !self.inner.synced.swap(true, Ordering::AcqRel) {
            info!(offset_ms, "clock: synced with server");
        }

        let change = OffsetChange { previous_ms, current_ms: offset_ms, magnitude_ms };
        // No subscribers is fine.
        let _ = self.inner.changes.send(change);
        change
    }

    /// Note that the exchange failed. The last good offset stays in effect.
    pub fn mark_unreachable(&self) {
        if self.inner.synced.swap(false, Ordering::AcqRel) {
            warn!(offset_ms = self.offset_ms(), "clock: server unreachable, holding last offset");
        }
    }

    /// Subscribe to offset changes larger than `threshold_ms`.
    #[must_use]
    pub fn subscribe(&self, threshold_ms: i64) -> OffsetWatcher {
        OffsetWatcher { rx: self.inner.changes.subscribe(), threshold_ms }
    }
}

#[cfg(test)]
#[path = "clock_test.rs"]
mod tests;
