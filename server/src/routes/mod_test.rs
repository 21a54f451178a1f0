use super::*;
use crate::state::test_helpers;
use axum::body::Body;
use axum::http::Request;
use frames::ServerMessage;
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use std::fs;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tower::ServiceExt;

type Client = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.expect("serve");
    });
    format!("ws://{addr}/ws")
}

async fn recv(ws: &mut Client) -> ServerMessage {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("receive timed out")
            .expect("stream ended")
            .expect("ws error");
        if let WsMessage::Text(text) = msg {
            return frames::decode_server_message(text.as_str()).expect("server message");
        }
    }
}

async fn send(ws: &mut Client, text: &str) {
    ws.send(WsMessage::Text(text.into())).await.expect("send");
}

#[tokio::test]
async fn healthz_is_ok() {
    let response = app(test_helpers::test_app_state())
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn timesync_returns_server_time() {
    let before = frames::now_ms();
    let response = app(test_helpers::test_app_state())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/timesync")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"id":9}"#))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let reply: frames::TimesyncResponse = serde_json::from_slice(&bytes).expect("timesync json");
    assert_eq!(reply.id, 9);
    assert!(reply.result >= before);
}

#[tokio::test]
async fn media_files_are_served_statically() {
    let dir = TempDir::new().expect("tempdir");
    fs::create_dir_all(dir.path().join("alpha/poster")).expect("dirs");
    fs::write(dir.path().join("alpha/poster/0001.png"), b"frame").expect("write");

    let response = app(test_helpers::test_app_state_with_media(dir.path()))
        .oneshot(Request::builder().uri("/media/alpha/poster/0001.png").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(&bytes[..], b"frame");
}

#[tokio::test]
async fn websocket_session_end_to_end() {
    let url = serve(test_helpers::test_app_state()).await;

    let (mut player, _) = tokio_tungstenite::connect_async(url.as_str()).await.expect("player connect");
    let ServerMessage::Welcome { client_id: player_id, .. } = recv(&mut player).await else {
        panic!("expected welcome");
    };
    assert_eq!(recv(&mut player).await, ServerMessage::Source { source: "0".into() });

    let (mut commander, _) = tokio_tungstenite::connect_async(url.as_str()).await.expect("commander connect");
    recv(&mut commander).await;
    recv(&mut commander).await;
    send(&mut commander, r#"{"type":"identify","role":"commander"}"#).await;
    let ServerMessage::ClientsUpdate { clients, total } = recv(&mut commander).await else {
        panic!("expected clientsUpdate");
    };
    assert_eq!(total, 2);
    assert!(clients.iter().any(|c| c.id == player_id && !c.is_commander));

    send(&mut commander, r#"{"type":"play","targetTime":1700000000000,"delay":0}"#).await;
    assert_eq!(
        recv(&mut player).await,
        ServerMessage::Play { video: "video-vertical".into(), target_time: 1_700_000_000_000, delay: 0 }
    );

    // A late joiner is put on the running timeline.
    let (mut late, _) = tokio_tungstenite::connect_async(url.as_str()).await.expect("late connect");
    recv(&mut late).await;
    recv(&mut late).await;
    assert!(matches!(recv(&mut late).await, ServerMessage::Play { target_time: 1_700_000_000_000, .. }));
    assert!(matches!(recv(&mut commander).await, ServerMessage::ClientsUpdate { total: 3, .. }));

    send(&mut player, "not json").await;
    assert_eq!(recv(&mut player).await, ServerMessage::error("Invalid JSON"));

    late.close(None).await.expect("close");
    assert!(matches!(recv(&mut commander).await, ServerMessage::ClientsUpdate { total: 2, .. }));
}
