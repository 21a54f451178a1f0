//! Drift corrector — keeps a playing unit on the shared timeline.
//!
//! DESIGN
//! ======
//! While a session plays, a check runs every `interval`:
//!
//! ```text
//! expected = (now - target) / 1000     seconds on the shared timeline
//! expected = expected mod duration     when the duration is known
//! |expected - actual| > threshold  =>  seek(expected)
//! ```
//!
//! The reference device with attached audio inverts this: its audio position
//! is ground truth and the visual unit is seeked onto it. Audio is never
//! touched there. Other devices seek their audio to `expected` with the
//! tighter audio threshold.
//!
//! The interval is a [`Ticker`] owned by the corrector. `stop()` drops the
//! underlying interval, so a stopped corrector can never fire again.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::info;

use crate::config::MIN_PERIOD;
use crate::playable::{PlayableUnit, wrap};
use crate::session::SyncRole;

/// Position on the shared timeline for a session that started at `target_ms`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn expected_position(now_ms: i64, target_ms: i64, duration: Option<f64>) -> f64 {
    let elapsed = (now_ms - target_ms) as f64 / 1000.0;
    match duration {
        Some(d) if d > 0.0 => elapsed.rem_euclid(d),
        _ => elapsed,
    }
}

// =============================================================================
// TICKER
// =============================================================================

/// Cancellable periodic tick. Pends forever while stopped.
pub struct Ticker {
    period: Duration,
    interval: Option<Interval>,
}

impl Ticker {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self { period: period.max(MIN_PERIOD), interval: None }
    }

    /// Start ticking; the first tick is one period from now.
    pub fn start(&mut self) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Push the next tick a full period out.
    pub fn reset(&mut self) {
        if let Some(interval) = self.interval.as_mut() {
            interval.reset();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

// =============================================================================
// CORRECTOR
// =============================================================================

/// A seek applied by one check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seek {
    pub from: f64,
    pub to: f64,
}

impl Seek {
    #[must_use]
    pub fn drift(&self) -> f64 {
        self.to - self.from
    }
}

/// Outcome of one drift check.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CorrectionReport {
    pub expected: f64,
    pub visual: Option<Seek>,
    pub audio: Option<Seek>,
}

impl CorrectionReport {
    #[must_use]
    pub fn corrected(&self) -> bool {
        self.visual.is_some() || self.audio.is_some()
    }
}

pub struct DriftCorrector {
    ticker: Ticker,
    visual_threshold: f64,
    audio_threshold: f64,
}

impl DriftCorrector {
    #[must_use]
    pub fn new(interval: Duration, visual_threshold: f64, audio_threshold: f64) -> Self {
        Self { ticker: Ticker::new(interval), visual_threshold, audio_threshold }
    }

    pub fn start(&mut self) {
        self.ticker.start();
    }

    pub fn stop(&mut self) {
        self.ticker.stop();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ticker.is_running()
    }

    /// Resolves at the next scheduled check.
    pub async fn tick(&mut self) {
        self.ticker.tick().await;
    }

    /// Compare positions and seek whatever drifted past its threshold.
    pub fn check(
        &self,
        now_ms: i64,
        target_ms: i64,
        role: SyncRole,
        visual: &mut dyn PlayableUnit,
        audio: Option<&mut dyn PlayableUnit>,
    ) -> CorrectionReport {
        let expected = expected_position(now_ms, target_ms, visual.duration());
        let mut report = CorrectionReport { expected, ..CorrectionReport::default() };

        match (role, audio) {
            (SyncRole::Master, Some(audio)) => {
                // Music tracks often report no duration; fold onto the visual loop.
                let period = visual.duration();
                let reference = wrap(audio.position(), period);
                report.visual = align(visual, reference, self.visual_threshold, period);
            }
            (role, audio) => {
                let period = visual.duration();
                report.visual = align(visual, expected, self.visual_threshold, period);
                if let (SyncRole::Slave, Some(audio)) = (role, audio) {
                    let period = audio.duration();
                    let audio_expected = expected_position(now_ms, target_ms, period);
                    report.audio = align(audio, audio_expected, self.audio_threshold, period);
                }
            }
        }

        if let Some(seek) = report.visual {
            info!(expected = seek.to, actual = seek.from, drift_ms = (seek.drift() * 1000.0).round(), "drift: visual resynced");
        }
        if let Some(seek) = report.audio {
            info!(expected = seek.to, actual = seek.from, drift_ms = (seek.drift() * 1000.0).round(), "drift: audio resynced");
        }
        report
    }

    /// Run a check now and restart the interval from here.
    pub fn force_resync(
        &mut self,
        now_ms: i64,
        target_ms: i64,
        role: SyncRole,
        visual: &mut dyn PlayableUnit,
        audio: Option<&mut dyn PlayableUnit>,
    ) -> CorrectionReport {
        self.ticker.reset();
        self.check(now_ms, target_ms, role, visual, audio)
    }
}

fn align(unit: &mut dyn PlayableUnit, to: f64, threshold: f64, period: Option<f64>) -> Option<Seek> {
    let from = unit.position();
    if loop_distance(from, to, period) <= threshold {
        return None;
    }
    unit.seek(to);
    Some(Seek { from, to })
}

/// Shortest distance between two positions on a loop of length `period`.
fn loop_distance(a: f64, b: f64, period: Option<f64>) -> f64 {
    let diff = b - a;
    match period {
        Some(p) if p > 0.0 => (diff - p * (diff / p).round()).abs(),
        _ => diff.abs(),
    }
}

#[cfg(test)]
#[path = "drift_test.rs"]
mod tests;
