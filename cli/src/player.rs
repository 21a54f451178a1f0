//! Headless player — the sync engine against a live server.
//!
//! Runs the same engine a display device runs, without presentation: the
//! clock polls `/timesync`, units are built from the catalog, and every
//! engine event is logged. Useful for watching drift corrections from a
//! terminal next to real screens.

use std::sync::Arc;

use clap::Args;
use frames::ServerMessage;
use futures_util::StreamExt;
use lockstep::engine::EngineEvent;
use lockstep::timesync::{HttpTimesync, spawn_timesync};
use lockstep::{CatalogLoader, Player, PlayerConfig, SharedClock, SourceResolver, SyncRole};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::{CliError, HTTP_TIMEOUT, KindArg, ws_url};

const INBOUND_CAPACITY: usize = 64;

#[derive(Args, Debug)]
pub(crate) struct PlayerArgs {
    /// Pin a media type; the announced project is kept.
    #[arg(long)]
    pub(crate) media: Option<String>,

    /// Start on this source until the server announces one.
    #[arg(long)]
    pub(crate) source: Option<String>,

    /// Force a unit variant instead of picking from the file types.
    #[arg(long, value_enum)]
    pub(crate) kind: Option<KindArg>,

    /// Treat the local audio track as the timing reference.
    #[arg(long)]
    pub(crate) master: bool,
}

pub(crate) async fn run(base_url: &str, args: PlayerArgs) -> Result<(), CliError> {
    let config = PlayerConfig::from_env();
    let clock = SharedClock::system();

    let transport = HttpTimesync::new(base_url, config.timesync_timeout)?;
    let _timesync = spawn_timesync(clock.clone(), Arc::new(transport), config.timesync_interval, config.timesync_samples);

    let loader = CatalogLoader::new(base_url, HTTP_TIMEOUT, args.kind.map(Into::into))?;
    let role = if args.master { SyncRole::Master } else { SyncRole::Slave };
    let mut player = Player::new(config, clock, Arc::new(loader))
        .with_role(role)
        .with_resolver(SourceResolver::new(args.media, args.source));
    let mut events = player.subscribe();

    let url = ws_url(base_url)?;
    let (mut stream, _) = connect_async(url.as_str())
        .await
        .map_err(|error| CliError::WsConnect(Box::new(error)))?;
    info!(%url, ?role, "player: connected");

    let (inbound_tx, inbound_rx) = mpsc::channel::<ServerMessage>(INBOUND_CAPACITY);
    let engine = tokio::spawn(player.run(inbound_rx));

    loop {
        tokio::select! {
            msg = stream.next() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => match frames::decode_server_message(text.as_str()) {
                        Ok(msg) => {
                            if inbound_tx.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "player: undecodable server message"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = events.recv() => log_event(&event),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(inbound_tx);
    if let Err(e) = engine.await {
        warn!(error = %e, "player: engine task failed");
    }
    info!("player: disconnected");
    Ok(())
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::Corrected(report) => {
            if let Some(seek) = &report.visual {
                info!(expected = report.expected, drift_ms = seek.drift() * 1000.0, "player: visual corrected");
            }
            if let Some(seek) = &report.audio {
                info!(expected = report.expected, drift_ms = seek.drift() * 1000.0, "player: audio corrected");
            }
        }
        EngineEvent::Showing { frame } => debug!(%frame, "player: showing frame"),
        EngineEvent::PlayFailed(e) => warn!(error = %e, "player: play failed"),
        EngineEvent::LoadFailed { source, error } => warn!(%source, %error, "player: load failed"),
        EngineEvent::ServerError { message } => warn!(%message, "player: server error"),
        EngineEvent::ReloadRequested => info!("player: reload requested"),
        other => info!(event = ?other, "player: event"),
    }
}
