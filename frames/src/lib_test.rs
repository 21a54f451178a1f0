use super::*;
use serde_json::json;

#[test]
fn decodes_play_with_camel_case_fields() {
    let inbound = decode_client_message(r#"{"type":"play","targetTime":1700000005000,"delay":5000}"#).expect("decode");
    assert_eq!(
        inbound,
        Inbound::Command(ClientMessage::Play { video: None, target_time: Some(1_700_000_005_000), delay: Some(5000) })
    );
}

#[test]
fn decodes_bare_play_as_server_scheduled() {
    let inbound = decode_client_message(r#"{"type":"play"}"#).expect("decode");
    assert_eq!(inbound, Inbound::Command(ClientMessage::Play { video: None, target_time: None, delay: None }));
}

#[test]
fn identify_commander_role() {
    let inbound = decode_client_message(r#"{"type":"identify","role":"commander"}"#).expect("decode");
    assert_eq!(inbound, Inbound::Command(ClientMessage::Identify { role: Role::Commander }));
}

#[test]
fn identify_without_commander_role_is_player() {
    let legacy = decode_client_message(r#"{"type":"identify","isMaster":true}"#).expect("decode");
    assert_eq!(legacy, Inbound::Command(ClientMessage::Identify { role: Role::Player }));

    let other = decode_client_message(r#"{"type":"identify","role":"billboard"}"#).expect("decode");
    assert_eq!(other, Inbound::Command(ClientMessage::Identify { role: Role::Player }));
}

#[test]
fn unknown_type_is_passed_through_for_echo() {
    let inbound = decode_client_message(r#"{"type":"dance","speed":3}"#).expect("decode");
    assert_eq!(inbound, Inbound::Unknown(json!({"type": "dance", "speed": 3})));
}

#[test]
fn missing_type_is_unknown() {
    let inbound = decode_client_message(r#"{"hello":"world"}"#).expect("decode");
    assert!(matches!(inbound, Inbound::Unknown(_)));
}

#[test]
fn invalid_json_is_rejected() {
    let err = decode_client_message("{not json").expect_err("should fail");
    assert!(matches!(err, DecodeError::InvalidJson(_)));
    assert_eq!(err.to_string(), "Invalid JSON");
}

#[test]
fn known_type_with_bad_fields_is_malformed() {
    let err = decode_client_message(r#"{"type":"setSource"}"#).expect_err("should fail");
    match err {
        DecodeError::Malformed { kind, .. } => assert_eq!(kind, "setSource"),
        DecodeError::InvalidJson(e) => panic!("unexpected invalid json: {e}"),
    }
}

#[test]
fn every_client_variant_is_listed_as_known() {
    let samples = [
        ClientMessage::Identify { role: Role::Commander },
        ClientMessage::GetClients,
        ClientMessage::Play { video: None, target_time: None, delay: None },
        ClientMessage::Pause,
        ClientMessage::Stop,
        ClientMessage::Reload,
        ClientMessage::SetSource { source: "p/poster".into() },
    ];
    for msg in samples {
        let value = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(value.get("type").and_then(Value::as_str), Some(msg.kind()));
        assert!(CLIENT_MESSAGE_TYPES.contains(&msg.kind()), "{} missing", msg.kind());
    }
}

#[test]
fn server_play_serializes_with_wire_names() {
    let msg = ServerMessage::Play { video: DEFAULT_VIDEO.into(), target_time: 42, delay: DEFAULT_PLAY_DELAY_MS };
    let value = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(value, json!({"type": "play", "video": "video-vertical", "targetTime": 42, "delay": 5000}));
}

#[test]
fn clients_update_counts_entries() {
    let msg = ServerMessage::clients_update(vec![
        ClientInfo { id: 1, connected_at: "2026-01-01T00:00:00Z".into(), is_commander: true },
        ClientInfo { id: 3, connected_at: "2026-01-01T00:00:01Z".into(), is_commander: false },
    ]);
    let value = serde_json::to_value(&msg).expect("serialize");
    assert_eq!(value["type"], "clientsUpdate");
    assert_eq!(value["total"], 2);
    assert_eq!(value["clients"][0]["isCommander"], true);
    assert_eq!(value["clients"][1]["connectedAt"], "2026-01-01T00:00:01Z");
}

#[test]
fn welcome_uses_client_id_key() {
    let value = serde_json::to_value(ServerMessage::Welcome { message: "Connected to server".into(), client_id: 7 })
        .expect("serialize");
    assert_eq!(value["clientId"], 7);
}

#[test]
fn decode_server_message_reads_broadcasts() {
    let msg = decode_server_message(r#"{"type":"source","source":"alpha/phone"}"#).expect("decode");
    assert_eq!(msg, ServerMessage::Source { source: "alpha/phone".into() });

    let err = decode_server_message(r#"{"type":"teleport"}"#).expect_err("unknown");
    assert!(matches!(err, DecodeError::Malformed { ref kind, .. } if kind == "teleport"));
}

#[test]
fn media_data_parses_each_shape() {
    let files: MediaData = serde_json::from_value(json!([{"fileName": "a.png", "url": "/media/p/poster/a.png"}]))
        .expect("files");
    assert!(matches!(files, MediaData::Files(ref f) if f.len() == 1));

    let album: MediaData =
        serde_json::from_value(json!({"1": [{"fileName": "x.png", "url": "/media/p/album/1/x.png"}], "2": []}))
            .expect("album");
    assert!(matches!(album, MediaData::Album(ref a) if a.len() == 2));

    let thumb: MediaData =
        serde_json::from_value(json!({"fileName": "thumb.png", "url": "/media/p/thumb.png"})).expect("thumb");
    assert!(matches!(thumb, MediaData::Thumb(_)));
}

#[test]
fn now_ms_is_positive() {
    assert!(now_ms() > 0);
}
