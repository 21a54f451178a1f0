//! Playable units — uniform transport control over decodable media.
//!
//! DESIGN
//! ======
//! The drift corrector and scheduler only ever talk to [`PlayableUnit`].
//! Two variants implement it:
//! - [`StreamUnit`]: a continuous decoder (video or audio element). It is not
//!   ready to play until the host reports it loaded.
//! - [`FrameSequenceUnit`]: an ordered list of still frames shown at a fixed
//!   rate. Its position is quantized to whole frames.
//!
//! Both keep time with a [`Playhead`] on the monotonic tokio clock and loop
//! when they reach their duration.

use std::fmt;

use tokio::time::Instant;

/// Frame rate of image sequences.
pub const FRAME_SEQUENCE_FPS: f64 = 24.0;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Stream,
    FrameSequence,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => f.write_str("stream"),
            Self::FrameSequence => f.write_str("frame-sequence"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayError {
    /// The unit cannot produce output yet (still loading, or empty).
    #[error("{0} unit is not ready")]
    NotReady(UnitKind),

    /// No unit is installed for the current source.
    #[error("no media loaded")]
    NoMedia,
}

/// Transport surface shared by every media variant.
///
/// Positions and durations are seconds. `duration()` is `None` until known.
pub trait PlayableUnit: Send {
    fn kind(&self) -> UnitKind;

    /// Start or resume playback from the current position.
    ///
    /// # Errors
    ///
    /// Returns [`PlayError::NotReady`] when the unit cannot play yet.
    fn play(&mut self) -> Result<(), PlayError>;

    fn pause(&mut self);

    /// Pause and rewind to zero.
    fn stop(&mut self);

    fn seek(&mut self, position: f64);

    fn position(&self) -> f64;

    fn duration(&self) -> Option<f64>;

    fn is_playing(&self) -> bool;

    /// Still frame the presentation layer should display now, for units made of frames.
    fn current_frame(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// PLAYHEAD
// =============================================================================

/// Position bookkeeping: an anchor position plus the instant playback resumed.
#[derive(Debug, Clone, Copy)]
pub struct Playhead {
    anchor: f64,
    resumed_at: Option<Instant>,
    rate: f64,
}

impl Default for Playhead {
    fn default() -> Self {
        Self { anchor: 0.0, resumed_at: None, rate: 1.0 }
    }
}

impl Playhead {
    /// Unwrapped position in seconds.
    #[must_use]
    pub fn raw(&self) -> f64 {
        match self.resumed_at {
            Some(at) => self.anchor + at.elapsed().as_secs_f64() * self.rate,
            None => self.anchor,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.resumed_at.is_some()
    }

    pub fn resume(&mut self) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
    }

    pub fn halt(&mut self) {
        self.anchor = self.raw();
        self.resumed_at = None;
    }

    pub fn set(&mut self, position: f64) {
        self.anchor = position;
        if self.resumed_at.is_some() {
            self.resumed_at = Some(Instant::now());
        }
    }

    /// Change the playback rate without moving the current position.
    pub fn set_rate(&mut self, rate: f64) {
        let position = self.raw();
        self.rate = rate;
        self.set(position);
    }
}

/// Fold `position` into `[0, duration)` when the duration is known.
pub(crate) fn wrap(position: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(d) if d > 0.0 => position.rem_euclid(d),
        _ => position,
    }
}

// =============================================================================
// STREAM UNIT
// =============================================================================

/// Continuous media decoded by the host (video or audio).
#[derive(Debug, Clone)]
pub struct StreamUnit {
    url: String,
    loaded: bool,
    duration: Option<f64>,
    playhead: Playhead,
}

impl StreamUnit {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), loaded: false, duration: None, playhead: Playhead::default() }
    }

    /// Build a unit that is already loaded.
    #[must_use]
    pub fn loaded(url: impl Into<String>, duration: Option<f64>) -> Self {
        let mut unit = Self::new(url);
        unit.mark_loaded(duration);
        unit
    }

    /// Host callback: the decoder can produce output. `duration` may still be unknown.
    pub fn mark_loaded(&mut self, duration: Option<f64>) {
        self.loaded = true;
        self.duration = duration.filter(|d| d.is_finite() && *d > 0.0);
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.playhead.set_rate(rate);
    }
}

impl PlayableUnit for StreamUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Stream
    }

    fn play(&mut self) -> Result<(), PlayError> {
        if !self.loaded {
            return Err(PlayError::NotReady(UnitKind::Stream));
        }
        self.playhead.resume();
        Ok(())
    }

    fn pause(&mut self) {
        self.playhead.halt();
    }

    fn stop(&mut self) {
        self.playhead.halt();
        self.playhead.set(0.0);
    }

    fn seek(&mut self, position: f64) {
        // An unloaded decoder has nothing to seek into.
        if !self.loaded {
            return;
        }
        self.playhead.set(wrap(position, self.duration));
    }

    fn position(&self) -> f64 {
        wrap(self.playhead.raw(), self.duration)
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.playhead.is_running()
    }
}

// =============================================================================
// FRAME SEQUENCE UNIT
// =============================================================================

/// Still frames shown in order at [`FRAME_SEQUENCE_FPS`].
#[derive(Debug, Clone, Default)]
pub struct FrameSequenceUnit {
    frames: Vec<String>,
    playhead: Playhead,
}

impl FrameSequenceUnit {
    #[must_use]
    pub fn new(frames: Vec<String>) -> Self {
        Self { frames, playhead: Playhead::default() }
    }

    /// Index of the frame to show for `position`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn frame_index_at(&self, position: f64) -> usize {
        if self.frames.is_empty() {
            return 0;
        }
        // Nudge so `k / fps` maps back to frame `k` despite rounding.
        let frame = (position * FRAME_SEQUENCE_FPS + 1e-9).floor().max(0.0) as usize;
        frame % self.frames.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.frame_index_at(self.playhead.raw())
    }
}

impl PlayableUnit for FrameSequenceUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::FrameSequence
    }

    fn play(&mut self) -> Result<(), PlayError> {
        if self.frames.is_empty() {
            return Err(PlayError::NotReady(UnitKind::FrameSequence));
        }
        self.playhead.resume();
        Ok(())
    }

    fn pause(&mut self) {
        self.playhead.halt();
    }

    fn stop(&mut self) {
        self.playhead.halt();
        self.playhead.set(0.0);
    }

    #[allow(clippy::cast_precision_loss)]
    fn seek(&mut self, position: f64) {
        let frame = self.frame_index_at(wrap(position, self.duration()));
        self.playhead.set(frame as f64 / FRAME_SEQUENCE_FPS);
    }

    #[allow(clippy::cast_precision_loss)]
    fn position(&self) -> f64 {
        self.current_index() as f64 / FRAME_SEQUENCE_FPS
    }

    #[allow(clippy::cast_precision_loss)]
    fn duration(&self) -> Option<f64> {
        if self.frames.is_empty() {
            None
        } else {
            Some(self.frames.len() as f64 / FRAME_SEQUENCE_FPS)
        }
    }

    fn is_playing(&self) -> bool {
        self.playhead.is_running()
    }

    fn current_frame(&self) -> Option<&str> {
        self.frames.get(self.current_index()).map(String::as_str)
    }
}

#[cfg(test)]
#[path = "playable_test.rs"]
mod tests;
