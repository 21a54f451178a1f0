//! Player engine — one client's sync loop.
//!
//! DESIGN
//! ======
//! A single task owns the units, the scheduler, the drift corrector and the
//! session, and `select!`s over:
//! - server messages (in arrival order)
//! - the scheduler's next check
//! - the drift corrector's interval
//! - finished unit loads
//! - large shared-clock offset changes
//!
//! Nothing else touches that state, so no two checks ever overlap and a
//! `pause`/`stop` has cancelled every timer by the time its handler returns.
//!
//! LIFECYCLE
//! =========
//! 1. `source` → resolve, stop the session, drop the old units, load new ones
//! 2. `play{targetTime}` → arm (or fire at once when already late)
//! 3. fire → seek to the shared-timeline position, `play()`, start correcting.
//!    With no media installed yet the target is parked and started from the
//!    finished load instead (a late joiner gets `source` then `play` back to
//!    back, long before its catalog fetch completes).
//! 4. `pause` / `stop` / `reload` / source change → cancel and clear
//!
//! The host observes the engine through [`EngineEvent`]s.

use std::sync::Arc;

use frames::{ClientInfo, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::clock::{OffsetChange, SharedClock};
use crate::config::PlayerConfig;
use crate::drift::{CorrectionReport, DriftCorrector, expected_position};
use crate::loader::{LoadError, LoadedMedia, UnitLoader};
use crate::playable::{PlayError, PlayableUnit, UnitKind};
use crate::scheduler::{Arming, Fire, PlaybackScheduler, Retry, SchedulerError, SchedulerState};
use crate::session::{PlaybackSession, SyncRole};
use crate::source::SourceResolver;

const LOAD_CHANNEL_CAPACITY: usize = 8;

// =============================================================================
// EVENTS
// =============================================================================

/// Things the host may want to react to or display.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Welcome { client_id: u64 },
    SourceChanged { source: String },
    MediaLoaded { source: String, kind: UnitKind, has_audio: bool },
    LoadFailed { source: String, error: String },
    Armed { target: i64 },
    Started { target: i64, lateness_ms: i64 },
    PlayFailed(SchedulerError),
    Corrected(CorrectionReport),
    /// Frame a frame-sequence unit shows after a start or a correction.
    Showing { frame: String },
    OffsetJump(OffsetChange),
    Paused,
    Stopped,
    /// The host should restart its presentation.
    ReloadRequested,
    Clients(Vec<ClientInfo>),
    ServerError { message: String },
}

struct LoadResult {
    seq: u64,
    source: String,
    result: Result<LoadedMedia, LoadError>,
}

// =============================================================================
// PLAYER
// =============================================================================

pub struct Player {
    config: PlayerConfig,
    clock: SharedClock,
    loader: Arc<dyn UnitLoader>,
    resolver: SourceResolver,
    session: PlaybackSession,
    scheduler: PlaybackScheduler,
    corrector: DriftCorrector,
    visual: Option<Box<dyn PlayableUnit>>,
    audio: Option<Box<dyn PlayableUnit>>,
    events: Option<mpsc::Sender<EngineEvent>>,
    client_id: Option<u64>,
    /// Target of a `play` that fired before any media was installed.
    awaiting_media: Option<i64>,
    load_seq: u64,
    loads_tx: mpsc::Sender<LoadResult>,
    loads_rx: mpsc::Receiver<LoadResult>,
}

impl Player {
    #[must_use]
    pub fn new(config: PlayerConfig, clock: SharedClock, loader: Arc<dyn UnitLoader>) -> Self {
        let (loads_tx, loads_rx) = mpsc::channel(LOAD_CHANNEL_CAPACITY);
        Self {
            scheduler: PlaybackScheduler::new(config.scheduler_max_step, config.play_retry_delay),
            corrector: DriftCorrector::new(config.sync_interval, config.visual_threshold, config.audio_threshold),
            config,
            clock,
            loader,
            resolver: SourceResolver::default(),
            session: PlaybackSession::default(),
            visual: None,
            audio: None,
            events: None,
            client_id: None,
            awaiting_media: None,
            load_seq: 0,
            loads_tx,
            loads_rx,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: SyncRole) -> Self {
        self.session.set_role(role);
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: SourceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Open the event stream. Events are dropped when the receiver lags.
    pub fn subscribe(&mut self) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel(self.config.event_channel_capacity);
        self.events = Some(tx);
        rx
    }

    // ===== ACCESSORS =====

    #[must_use]
    pub fn session(&self) -> PlaybackSession {
        self.session
    }

    #[must_use]
    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    #[must_use]
    pub fn is_correcting(&self) -> bool {
        self.corrector.is_running()
    }

    #[must_use]
    pub fn visual(&self) -> Option<&dyn PlayableUnit> {
        self.visual.as_deref()
    }

    #[must_use]
    pub fn audio(&self) -> Option<&dyn PlayableUnit> {
        self.audio.as_deref()
    }

    #[must_use]
    pub fn client_id(&self) -> Option<u64> {
        self.client_id
    }

    #[must_use]
    pub fn current_source(&self) -> Option<&str> {
        self.resolver.current()
    }

    // ===== LOOP =====

    /// Drive the engine until `inbound` closes.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<ServerMessage>) {
        if let Some(source) = self.resolver.current().map(str::to_owned) {
            self.spawn_load(source);
        }
        let mut offsets = self.clock.subscribe(self.config.offset_change_threshold_ms);

        loop {
            tokio::select! {
                msg = inbound.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle_message(msg);
                }
                () = self.scheduler.wake() => self.on_scheduler_wake(),
                () = self.corrector.tick() => self.correct(false),
                Some(loaded) = self.loads_rx.recv() => self.on_loaded(loaded),
                Some(change) = offsets.changed() => self.on_offset_change(change),
            }
        }

        self.halt_session();
        for unit in self.units_mut() {
            unit.pause();
        }
        info!("player: server channel closed");
    }

    /// Apply one server message.
    pub fn handle_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Welcome { client_id, .. } => {
                info!(client_id, "player: welcomed");
                self.client_id = Some(client_id);
                self.emit(EngineEvent::Welcome { client_id });
            }
            ServerMessage::Source { source } => self.on_source(&source),
            ServerMessage::Play { target_time, .. } => self.play_at(Some(target_time)),
            ServerMessage::Pause => self.pause(),
            ServerMessage::Stop => self.stop(),
            ServerMessage::Reload => self.reload(),
            ServerMessage::ClientsUpdate { clients, total } => {
                debug!(total, "player: clients update");
                self.emit(EngineEvent::Clients(clients));
            }
            ServerMessage::Echo { data } => debug!(%data, "player: echo"),
            ServerMessage::Error { message } => {
                warn!(%message, "player: server reported error");
                self.emit(EngineEvent::ServerError { message });
            }
        }
    }

    // ===== TRANSPORT =====

    /// Start at `target` on the shared clock, or resume now when `None`.
    pub fn play_at(&mut self, target: Option<i64>) {
        self.corrector.stop();
        self.session.clear();

        let now = self.clock.now();
        let target = target.unwrap_or_else(|| now - secs_to_ms(self.visual.as_deref().map_or(0.0, |v| v.position())));

        match self.scheduler.arm(target, now) {
            Arming::Armed => {
                info!(target_time = target, wait_ms = target - now, "player: play armed");
                self.emit(EngineEvent::Armed { target });
            }
            Arming::Due(fire) => self.fire(fire),
        }
    }

    pub fn pause(&mut self) {
        let engaged = self.is_engaged();
        self.halt_session();
        for unit in self.units_mut() {
            unit.pause();
        }
        if engaged {
            info!("player: paused");
            self.emit(EngineEvent::Paused);
        }
    }

    pub fn stop(&mut self) {
        let rewound = self.visual.as_deref().is_none_or(|v| v.position() == 0.0)
            && self.audio.as_deref().is_none_or(|a| a.position() == 0.0);
        let engaged = self.is_engaged() || !rewound;
        self.halt_session();
        for unit in self.units_mut() {
            unit.stop();
        }
        if engaged {
            info!("player: stopped");
            self.emit(EngineEvent::Stopped);
        }
    }

    fn reload(&mut self) {
        self.halt_session();
        for unit in self.units_mut() {
            unit.pause();
        }
        info!("player: reload requested");
        self.emit(EngineEvent::ReloadRequested);
    }

    fn is_engaged(&self) -> bool {
        self.scheduler.state() != SchedulerState::Idle
            || self.session.is_active()
            || self.awaiting_media.is_some()
            || self.visual.as_deref().is_some_and(|v| v.is_playing())
            || self.audio.as_deref().is_some_and(|a| a.is_playing())
    }

    /// Cancel the pending start and the drift interval, and clear the session.
    fn halt_session(&mut self) {
        self.awaiting_media = None;
        self.scheduler.cancel();
        self.corrector.stop();
        self.session.clear();
    }

    fn units_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn PlayableUnit>> {
        self.visual.iter_mut().chain(self.audio.iter_mut())
    }

    // ===== SCHEDULING =====

    fn on_scheduler_wake(&mut self) {
        if let Some(fire) = self.scheduler.on_wake(self.clock.now()) {
            self.fire(fire);
        }
    }

    fn fire(&mut self, fire: Fire) {
        let now = self.clock.now();
        match self.start_units(fire.target, now) {
            Ok(()) => {
                self.scheduler.started(fire);
                self.session.begin(fire.target);
                self.corrector.start();
                info!(target_time = fire.target, lateness_ms = fire.lateness_ms, "player: playback started");
                self.emit(EngineEvent::Started { target: fire.target, lateness_ms: fire.lateness_ms });
                self.emit_frame();
            }
            Err(PlayError::NoMedia) => {
                self.scheduler.cancel();
                self.awaiting_media = Some(fire.target);
                info!(target_time = fire.target, "player: play parked until media loads");
            }
            Err(e) => {
                if let Retry::GiveUp = self.scheduler.play_failed(fire) {
                    let err = SchedulerError::PlayFailed { target: fire.target, attempts: 2, source: e };
                    error!(error = %err, "player: giving up on play");
                    self.emit(EngineEvent::PlayFailed(err));
                }
            }
        }
    }

    /// Seek every unit to its position on the shared timeline and play.
    fn start_units(&mut self, target: i64, now: i64) -> Result<(), PlayError> {
        let visual = self.visual.as_deref_mut().ok_or(PlayError::NoMedia)?;
        let position = expected_position(now, target, visual.duration());
        visual.seek(position);
        visual.play()?;

        if let Some(audio) = self.audio.as_deref_mut() {
            let position = expected_position(now, target, audio.duration());
            audio.seek(position);
            if let Err(e) = audio.play() {
                warn!(error = %e, "player: audio track did not start");
            }
        }
        Ok(())
    }

    // ===== DRIFT =====

    fn correct(&mut self, force: bool) {
        let Some(target) = self.session.target_instant() else { return };
        let Some(visual) = self.visual.as_deref_mut() else { return };
        let audio = self.audio.as_mut().map(|a| &mut **a as &mut dyn PlayableUnit);
        let now = self.clock.now();
        let role = self.session.role();

        let report = if force {
            self.corrector.force_resync(now, target, role, visual, audio)
        } else {
            self.corrector.check(now, target, role, visual, audio)
        };
        if report.corrected() {
            self.emit(EngineEvent::Corrected(report));
            self.emit_frame();
        }
    }

    fn on_offset_change(&mut self, change: OffsetChange) {
        info!(change_ms = change.magnitude_ms, offset_ms = change.current_ms, "player: large offset change");
        self.emit(EngineEvent::OffsetJump(change));
        if self.session.is_active() {
            self.correct(true);
        }
    }

    // ===== SOURCE =====

    fn on_source(&mut self, announced: &str) {
        let Some(source) = self.resolver.resolve(announced) else {
            debug!(%announced, "player: source unchanged");
            return;
        };
        info!(%source, "player: source changed");

        self.halt_session();
        for unit in self.units_mut() {
            unit.stop();
        }
        self.visual = None;
        self.audio = None;

        self.emit(EngineEvent::SourceChanged { source: source.clone() });
        self.spawn_load(source);
    }

    fn spawn_load(&mut self, source: String) {
        self.load_seq += 1;
        let seq = self.load_seq;
        let loader = Arc::clone(&self.loader);
        let tx = self.loads_tx.clone();
        tokio::spawn(async move {
            let result = loader.load(&source).await;
            if tx.send(LoadResult { seq, source, result }).await.is_err() {
                debug!("player: load finished after shutdown");
            }
        });
    }

    fn on_loaded(&mut self, loaded: LoadResult) {
        if loaded.seq != self.load_seq {
            debug!(source = %loaded.source, "player: discarding stale load");
            return;
        }
        match loaded.result {
            Ok(media) => {
                let kind = media.visual.kind();
                let has_audio = media.audio.is_some();
                info!(source = %loaded.source, %kind, has_audio, "player: media loaded");
                self.emit(EngineEvent::MediaLoaded { source: loaded.source, kind, has_audio });
                self.install_media(media);
            }
            Err(e) => {
                warn!(source = %loaded.source, error = %e, "player: media load failed");
                self.emit(EngineEvent::LoadFailed { source: loaded.source, error: e.to_string() });
            }
        }
    }

    /// Replace the active units. A running session picks them up in place,
    /// and a parked `play` is started on them.
    pub fn install_media(&mut self, media: LoadedMedia) {
        for unit in self.units_mut() {
            unit.stop();
        }
        self.visual = Some(media.visual);
        self.audio = media.audio;

        if let Some(target) = self.session.target_instant() {
            let now = self.clock.now();
            if let Err(e) = self.start_units(target, now) {
                warn!(error = %e, "player: new media could not join running session");
            }
        } else if let Some(target) = self.awaiting_media.take() {
            self.play_at(Some(target));
        }
    }

    fn emit_frame(&self) {
        if let Some(frame) = self.visual.as_deref().and_then(PlayableUnit::current_frame) {
            self.emit(EngineEvent::Showing { frame: frame.to_owned() });
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.events {
            if tx.try_send(event).is_err() {
                debug!("player: event dropped");
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn secs_to_ms(secs: f64) -> i64 {
    (secs * 1000.0).round() as i64
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
