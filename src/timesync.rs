//! Timesync — periodic round-trip offset exchange with the server.
//!
//! DESIGN
//! ======
//! Each poll sends a burst of requests. For every reply the offset is
//! `server - (t0 + t1) / 2` where `t0`/`t1` bracket the round trip on the
//! local clock. Samples slower than the median round trip are dropped and the
//! rest are averaged, so one congested request cannot skew the estimate.
//!
//! The transport sits behind [`OffsetTransport`] so the estimator and the
//! poll loop can be tested without a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use frames::{TimesyncRequest, TimesyncResponse};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::config::MIN_PERIOD;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("timesync client build failed: {0}")]
    HttpClientBuild(String),

    #[error("timesync request failed: {0}")]
    Request(String),

    #[error("timesync response error: status {status}")]
    Status { status: u16 },

    #[error("timesync reply id {got} does not match request {expected}")]
    MismatchedReply { expected: u64, got: u64 },

    #[error("timesync poll produced no samples")]
    NoSamples,
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// One request/response round trip returning the server's epoch milliseconds.
#[async_trait::async_trait]
pub trait OffsetTransport: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`ClockError`] when the server cannot be reached or replies
    /// with something other than a matching timesync response.
    async fn server_time(&self, id: u64) -> Result<i64, ClockError>;
}

/// `POST {base}/timesync` over HTTP.
pub struct HttpTimesync {
    http: reqwest::Client,
    url: String,
}

impl HttpTimesync {
    /// # Errors
    ///
    /// Returns [`ClockError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClockError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClockError::HttpClientBuild(e.to_string()))?;
        let url = format!("{}/timesync", base_url.trim_end_matches('/'));
        Ok(Self { http, url })
    }
}

#[async_trait::async_trait]
impl OffsetTransport for HttpTimesync {
    async fn server_time(&self, id: u64) -> Result<i64, ClockError> {
        let response = self
            .http
            .post(&self.url)
            .json(&TimesyncRequest { id })
            .send()
            .await
            .map_err(|e| ClockError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ClockError::Status { status });
        }

        let reply: TimesyncResponse = response
            .json()
            .await
            .map_err(|e| ClockError::Request(e.to_string()))?;
        if reply.id != id {
            return Err(ClockError::MismatchedReply { expected: id, got: reply.id });
        }
        Ok(reply.result)
    }
}

// =============================================================================
// ESTIMATION
// =============================================================================

/// Offset and round-trip time from one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetSample {
    pub offset_ms: i64,
    pub rtt_ms: i64,
}

impl OffsetSample {
    #[must_use]
    pub fn from_round_trip(sent_ms: i64, server_ms: i64, received_ms: i64) -> Self {
        let midpoint = sent_ms + (received_ms - sent_ms) / 2;
        Self { offset_ms: server_ms - midpoint, rtt_ms: received_ms - sent_ms }
    }
}

/// Average offset of the samples at or below the median round trip.
#[must_use]
pub fn estimate_offset(samples: &[OffsetSample]) -> Option<i64> {
    if samples.is_empty() {
        return None;
    }

    let mut rtts: Vec<i64> = samples.iter().map(|s| s.rtt_ms).collect();
    rtts.sort_unstable();
    let median = rtts[rtts.len() / 2];

    let kept: Vec<i64> = samples
        .iter()
        .filter(|s| s.rtt_ms <= median)
        .map(|s| s.offset_ms)
        .collect();
    let count = i64::try_from(kept.len()).ok()?;
    let sum: i64 = kept.iter().sum();
    Some(sum.div_euclid(count))
}

/// Run one burst of `samples` exchanges and return the estimated offset.
///
/// # Errors
///
/// Returns the first transport error, or [`ClockError::NoSamples`] when
/// `samples` is zero.
pub async fn measure_offset(
    clock: &SharedClock,
    transport: &dyn OffsetTransport,
    samples: usize,
    next_id: &AtomicU64,
) -> Result<i64, ClockError> {
    let mut collected = Vec::with_capacity(samples);
    for _ in 0..samples {
        let id = next_id.fetch_add(1, Ordering::Relaxed);
        let sent = clock.local_now();
        let server = transport.server_time(id).await?;
        let received = clock.local_now();
        collected.push(OffsetSample::from_round_trip(sent, server, received));
    }
    estimate_offset(&collected).ok_or(ClockError::NoSamples)
}

// =============================================================================
// POLL LOOP
// =============================================================================

/// Handle to the background poll task. Dropping it stops polling.
pub struct TimesyncHandle {
    task: JoinHandle<()>,
}

impl TimesyncHandle {
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for TimesyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the periodic offset exchange that keeps `clock` aligned.
pub fn spawn_timesync(
    clock: SharedClock,
    transport: Arc<dyn OffsetTransport>,
    interval: Duration,
    samples: usize,
) -> TimesyncHandle {
    let interval = interval.max(MIN_PERIOD);
    let task = tokio::spawn(async move {
        let next_id = AtomicU64::new(1);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match measure_offset(&clock, transport.as_ref(), samples, &next_id).await {
                Ok(offset_ms) => {
                    let change = clock.apply_offset(offset_ms);
                    if change.magnitude_ms > 0 {
                        debug!(offset_ms, change_ms = change.magnitude_ms, "timesync: offset updated");
                    }
                }
                Err(e) => {
                    if clock.is_synced() {
                        warn!(error = %e, "timesync: exchange failed");
                    }
                    clock.mark_unreachable();
                }
            }
        }
    });
    info!(interval_ms = interval.as_millis(), samples, "timesync: polling started");
    TimesyncHandle { task }
}

#[cfg(test)]
#[path = "timesync_test.rs"]
mod tests;
