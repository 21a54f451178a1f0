mod player;

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use frames::{ClientMessage, Role, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use lockstep::UnitKind;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing_subscriber::EnvFilter;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("message decode failed: {0}")]
    Decode(#[from] frames::DecodeError),
    #[error("timed out waiting for the server")]
    Timeout,
    #[error("server returned error: {0}")]
    ServerError(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error(transparent)]
    Clock(#[from] lockstep::timesync::ClockError),
    #[error(transparent)]
    Load(#[from] lockstep::loader::LoadError),
}

#[derive(Parser, Debug)]
#[command(name = "lockstep-cli", about = "Control and run lockstep players")]
struct Cli {
    #[arg(long, env = "LOCKSTEP_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check `/healthz`.
    Ping,
    /// Start every player at a shared instant.
    Play(PlayArgs),
    Pause,
    Stop,
    Reload,
    /// Switch the shared source, e.g. `alpha/poster` or `alpha/album/2`.
    Source { source: String },
    /// Print the connected clients.
    Clients,
    /// Print the catalog's project names.
    Projects,
    /// Print the files of one media type.
    Media {
        project: String,
        media_type: String,
        subfolder: Option<String>,
    },
    /// Run a headless player that follows the server.
    Player(player::PlayerArgs),
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[arg(long)]
    video: Option<String>,

    /// Absolute target instant (server epoch ms).
    #[arg(long, conflicts_with = "in_ms")]
    target_time: Option<i64>,

    /// Target instant relative to now, in ms. The server picks one when both are absent.
    #[arg(long)]
    in_ms: Option<i64>,
}

/// `--kind` values for the headless player.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Stream,
    Frames,
}

impl From<KindArg> for UnitKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Stream => UnitKind::Stream,
            KindArg::Frames => UnitKind::FrameSequence,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let base_url = cli.base_url.trim_end_matches('/').to_owned();

    match cli.command {
        Command::Ping => run_ping(&base_url).await,
        Command::Play(args) => {
            let target_time = args.target_time.or(args.in_ms.map(|ms| frames::now_ms() + ms));
            let delay = args.in_ms;
            send_command(&base_url, ClientMessage::Play { video: args.video, target_time, delay }).await
        }
        Command::Pause => send_command(&base_url, ClientMessage::Pause).await,
        Command::Stop => send_command(&base_url, ClientMessage::Stop).await,
        Command::Reload => send_command(&base_url, ClientMessage::Reload).await,
        Command::Source { source } => send_command(&base_url, ClientMessage::SetSource { source }).await,
        Command::Clients => run_clients(&base_url).await,
        Command::Projects => print_json(&api_get(&base_url, "/api/media/projects").await?),
        Command::Media { project, media_type, subfolder } => {
            let path = match subfolder {
                Some(sub) => format!("/api/media/projects/{project}/{media_type}/{sub}"),
                None => format!("/api/media/projects/{project}/{media_type}"),
            };
            print_json(&api_get(&base_url, &path).await?)
        }
        Command::Player(args) => player::run(&base_url, args).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let response = client.get(format!("{base_url}/healthz")).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError(format!("health check failed: HTTP {}", status.as_u16())));
    }
    println!("ok");
    Ok(())
}

/// Connect as a commander, send one command and close.
async fn send_command(base_url: &str, cmd: ClientMessage) -> Result<(), CliError> {
    let mut stream = connect_commander(base_url).await?;
    send_message(&mut stream, &cmd).await?;
    tracing::info!(kind = cmd.kind(), "command sent");
    // Best effort: the command is already on the wire.
    if let Err(e) = stream.close(None).await {
        tracing::debug!(error = %e, "websocket close failed");
    }
    Ok(())
}

async fn run_clients(base_url: &str) -> Result<(), CliError> {
    let mut stream = connect_commander(base_url).await?;
    loop {
        if let ServerMessage::ClientsUpdate { clients, total } = recv_next(&mut stream, RECV_TIMEOUT).await? {
            print_json(&serde_json::json!({ "clients": clients, "total": total }))?;
            return Ok(());
        }
    }
}

/// Open the control channel and identify as a commander, so our own
/// broadcasts are not echoed back at us.
async fn connect_commander(base_url: &str) -> Result<WsStream, CliError> {
    let url = ws_url(base_url)?;
    let (mut stream, _) = connect_async(url.as_str())
        .await
        .map_err(|error| CliError::WsConnect(Box::new(error)))?;

    loop {
        if let ServerMessage::Welcome { client_id, .. } = recv_next(&mut stream, RECV_TIMEOUT).await? {
            tracing::debug!(client_id, "connected");
            break;
        }
    }
    send_message(&mut stream, &ClientMessage::Identify { role: Role::Commander }).await?;
    Ok(stream)
}

async fn send_message(stream: &mut WsStream, cmd: &ClientMessage) -> Result<(), CliError> {
    let text = serde_json::to_string(cmd)?;
    stream
        .send(Message::Text(text.into()))
        .await
        .map_err(|error| CliError::WsConnect(Box::new(error)))
}

/// Next server message; `error` replies become [`CliError::ServerError`].
async fn recv_next(stream: &mut WsStream, timeout: Duration) -> Result<ServerMessage, CliError> {
    let fut = async {
        loop {
            let Some(message) = stream.next().await else {
                return Err(CliError::WsClosed);
            };
            match message.map_err(|error| CliError::WsConnect(Box::new(error)))? {
                Message::Text(text) => {
                    return match frames::decode_server_message(text.as_str())? {
                        ServerMessage::Error { message } => Err(CliError::ServerError(message)),
                        msg => Ok(msg),
                    };
                }
                Message::Close(_) => return Err(CliError::WsClosed),
                _ => {}
            }
        }
    };

    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| CliError::Timeout)?
}

async fn api_get(base_url: &str, path: &str) -> Result<Value, CliError> {
    let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let response = client.get(format!("{base_url}{path}")).send().await?;
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);

    if !status.is_success() {
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .map_or_else(|| value.to_string(), ToOwned::to_owned);
        return Err(CliError::ServerError(format!("HTTP {}: {message}", status.as_u16())));
    }
    Ok(value)
}

fn ws_url(base_url: &str) -> Result<String, CliError> {
    let base_url = base_url.trim_end_matches('/');
    if let Some(rest) = base_url.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/ws"));
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/ws"));
    }
    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_maps_scheme_and_path() {
        assert_eq!(ws_url("http://127.0.0.1:3000").ok().as_deref(), Some("ws://127.0.0.1:3000/ws"));
        assert_eq!(ws_url("https://stage.example/").ok().as_deref(), Some("wss://stage.example/ws"));
        assert!(matches!(ws_url("ftp://nope"), Err(CliError::InvalidBaseUrl(_))));
    }

    #[test]
    fn play_args_conflict() {
        let parsed = Cli::try_parse_from(["lockstep-cli", "play", "--target-time", "1", "--in-ms", "2"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn player_args_parse() {
        let cli = Cli::try_parse_from(["lockstep-cli", "player", "--media", "billboard", "--kind", "frames", "--master"])
            .expect("player args");
        let Command::Player(args) = cli.command else {
            panic!("expected player subcommand");
        };
        assert_eq!(args.media.as_deref(), Some("billboard"));
        assert!(args.master);
        assert!(matches!(args.kind, Some(KindArg::Frames)));
    }

    #[test]
    fn kind_arg_maps_to_unit_kind() {
        assert_eq!(UnitKind::from(KindArg::Stream), UnitKind::Stream);
        assert_eq!(UnitKind::from(KindArg::Frames), UnitKind::FrameSequence);
    }
}
