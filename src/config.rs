//! Player configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_VISUAL_THRESHOLD_SECS: f64 = 0.1;
pub const DEFAULT_AUDIO_THRESHOLD_SECS: f64 = 0.05;
pub const DEFAULT_OFFSET_CHANGE_THRESHOLD_MS: i64 = 100;
pub const DEFAULT_PLAY_RETRY_DELAY_MS: u64 = 250;
pub const DEFAULT_SCHEDULER_MAX_STEP_MS: u64 = 10;
pub const DEFAULT_TIMESYNC_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_TIMESYNC_SAMPLES: usize = 5;
pub const DEFAULT_TIMESYNC_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Shortest period accepted for any interval timer.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Tunables for one [`crate::engine::Player`] and its timesync loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerConfig {
    /// Period of the drift check while playing.
    pub sync_interval: Duration,
    /// Allowed drift of the visual unit, in seconds.
    pub visual_threshold: f64,
    /// Allowed drift of an attached audio track, in seconds.
    pub audio_threshold: f64,
    /// Offset changes above this (ms) force an immediate resync.
    pub offset_change_threshold_ms: i64,
    /// Wait before the single retry of a rejected `play()`.
    pub play_retry_delay: Duration,
    /// Longest single sleep while armed.
    pub scheduler_max_step: Duration,
    pub timesync_interval: Duration,
    pub timesync_samples: usize,
    pub timesync_timeout: Duration,
    pub event_channel_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_millis(DEFAULT_SYNC_INTERVAL_MS),
            visual_threshold: DEFAULT_VISUAL_THRESHOLD_SECS,
            audio_threshold: DEFAULT_AUDIO_THRESHOLD_SECS,
            offset_change_threshold_ms: DEFAULT_OFFSET_CHANGE_THRESHOLD_MS,
            play_retry_delay: Duration::from_millis(DEFAULT_PLAY_RETRY_DELAY_MS),
            scheduler_max_step: Duration::from_millis(DEFAULT_SCHEDULER_MAX_STEP_MS),
            timesync_interval: Duration::from_millis(DEFAULT_TIMESYNC_INTERVAL_MS),
            timesync_samples: DEFAULT_TIMESYNC_SAMPLES,
            timesync_timeout: Duration::from_millis(DEFAULT_TIMESYNC_TIMEOUT_MS),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl PlayerConfig {
    /// Build player config from environment variables.
    ///
    /// Every value is optional; unparsable values fall back to the default.
    /// - `LOCKSTEP_SYNC_INTERVAL_MS`
    /// - `LOCKSTEP_VISUAL_THRESHOLD_SECS`
    /// - `LOCKSTEP_AUDIO_THRESHOLD_SECS`
    /// - `LOCKSTEP_OFFSET_CHANGE_THRESHOLD_MS`
    /// - `LOCKSTEP_PLAY_RETRY_DELAY_MS`
    /// - `LOCKSTEP_SCHEDULER_MAX_STEP_MS`
    /// - `LOCKSTEP_TIMESYNC_INTERVAL_MS`
    /// - `LOCKSTEP_TIMESYNC_SAMPLES`
    /// - `LOCKSTEP_TIMESYNC_TIMEOUT_MS`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            sync_interval: Duration::from_millis(
                env_parse("LOCKSTEP_SYNC_INTERVAL_MS", DEFAULT_SYNC_INTERVAL_MS).max(1),
            ),
            visual_threshold: env_parse("LOCKSTEP_VISUAL_THRESHOLD_SECS", DEFAULT_VISUAL_THRESHOLD_SECS),
            audio_threshold: env_parse("LOCKSTEP_AUDIO_THRESHOLD_SECS", DEFAULT_AUDIO_THRESHOLD_SECS),
            offset_change_threshold_ms: env_parse(
                "LOCKSTEP_OFFSET_CHANGE_THRESHOLD_MS",
                DEFAULT_OFFSET_CHANGE_THRESHOLD_MS,
            ),
            play_retry_delay: Duration::from_millis(env_parse(
                "LOCKSTEP_PLAY_RETRY_DELAY_MS",
                DEFAULT_PLAY_RETRY_DELAY_MS,
            )),
            scheduler_max_step: Duration::from_millis(
                env_parse("LOCKSTEP_SCHEDULER_MAX_STEP_MS", DEFAULT_SCHEDULER_MAX_STEP_MS).max(1),
            ),
            timesync_interval: Duration::from_millis(
                env_parse("LOCKSTEP_TIMESYNC_INTERVAL_MS", DEFAULT_TIMESYNC_INTERVAL_MS).max(1),
            ),
            timesync_samples: env_parse("LOCKSTEP_TIMESYNC_SAMPLES", DEFAULT_TIMESYNC_SAMPLES).max(1),
            timesync_timeout: Duration::from_millis(env_parse(
                "LOCKSTEP_TIMESYNC_TIMEOUT_MS",
                DEFAULT_TIMESYNC_TIMEOUT_MS,
            )),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
