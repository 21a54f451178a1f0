//! Playback scheduler — turns a shared-clock target instant into one local start.
//!
//! DESIGN
//! ======
//! States: `Idle -> Armed -> Playing -> Idle`, plus `Retrying` between a
//! rejected `play()` and its single retry.
//!
//! The scheduler never sleeps itself. It records when it next wants to look
//! at the clock and the owning loop awaits [`PlaybackScheduler::wake`] in its
//! `select!`. While armed, every wake re-reads the shared clock and sleeps at
//! most `max_step`, so an offset correction that lands mid-countdown moves
//! the start instant with it.
//!
//! A target already in the past is due immediately: [`PlaybackScheduler::arm`]
//! hands back the [`Fire`] without ever entering `Armed`.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::playable::PlayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Armed { target: i64 },
    Retrying { target: i64 },
    Playing { target: i64 },
}

/// Instruction to start the unit now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fire {
    pub target: i64,
    /// How far past the target the fire happened, in ms.
    pub lateness_ms: i64,
}

/// Result of [`PlaybackScheduler::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arming {
    /// Waiting for the target instant.
    Armed,
    /// Target already reached; start immediately.
    Due(Fire),
}

/// What to do after a rejected `play()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    After(Duration),
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("play for target {target} failed after {attempts} attempts: {source}")]
    PlayFailed {
        target: i64,
        attempts: u32,
        #[source]
        source: PlayError,
    },
}

pub struct PlaybackScheduler {
    state: SchedulerState,
    wake_at: Option<Instant>,
    max_step: Duration,
    retry_delay: Duration,
    retried: bool,
}

impl PlaybackScheduler {
    #[must_use]
    pub fn new(max_step: Duration, retry_delay: Duration) -> Self {
        Self { state: SchedulerState::Idle, wake_at: None, max_step, retry_delay, retried: false }
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Target of the armed, retrying or playing session.
    #[must_use]
    pub fn target(&self) -> Option<i64> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Armed { target }
            | SchedulerState::Retrying { target }
            | SchedulerState::Playing { target } => Some(target),
        }
    }

    /// Whether a wake-up is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.wake_at.is_some()
    }

    /// Schedule a start at `target`, replacing anything already scheduled.
    pub fn arm(&mut self, target: i64, now_ms: i64) -> Arming {
        self.cancel();
        let remaining = target - now_ms;
        if remaining <= 0 {
            debug!(target, lateness_ms = -remaining, "scheduler: target already reached");
            return Arming::Due(Fire { target, lateness_ms: -remaining });
        }
        self.state = SchedulerState::Armed { target };
        self.schedule_check(remaining);
        debug!(target, remaining_ms = remaining, "scheduler: armed");
        Arming::Armed
    }

    /// Called when [`Self::wake`] resolves. Returns the fire once due.
    pub fn on_wake(&mut self, now_ms: i64) -> Option<Fire> {
        self.wake_at = None;
        match self.state {
            SchedulerState::Armed { target } => {
                let remaining = target - now_ms;
                if remaining <= 0 {
                    return Some(Fire { target, lateness_ms: -remaining });
                }
                self.schedule_check(remaining);
                None
            }
            SchedulerState::Retrying { target } => Some(Fire { target, lateness_ms: (now_ms - target).max(0) }),
            SchedulerState::Idle | SchedulerState::Playing { .. } => None,
        }
    }

    /// The unit accepted `play()`.
    pub fn started(&mut self, fire: Fire) {
        self.wake_at = None;
        self.retried = false;
        self.state = SchedulerState::Playing { target: fire.target };
    }

    /// The unit rejected `play()`. The first rejection earns one retry.
    pub fn play_failed(&mut self, fire: Fire) -> Retry {
        if self.retried {
            self.cancel();
            return Retry::GiveUp;
        }
        self.retried = true;
        self.state = SchedulerState::Retrying { target: fire.target };
        self.wake_at = Some(Instant::now() + self.retry_delay);
        warn!(target = fire.target, delay_ms = self.retry_delay.as_millis(), "scheduler: play rejected, retrying once");
        Retry::After(self.retry_delay)
    }

    /// Drop any pending timer and return to `Idle`.
    pub fn cancel(&mut self) {
        self.state = SchedulerState::Idle;
        self.wake_at = None;
        self.retried = false;
    }

    /// Resolves at the next scheduled check; pends forever when none is set.
    pub async fn wake(&self) {
        match self.wake_at {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }

    fn schedule_check(&mut self, remaining_ms: i64) {
        let remaining = Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(0));
        self.wake_at = Some(Instant::now() + remaining.min(self.max_step));
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
