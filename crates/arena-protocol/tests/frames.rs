// crates/arena-protocol/tests/frames.rs
use arena_protocol::engine_frame::is_close_line;
use arena_protocol::{
    tag_with_session, ConnectRequest, EngineFrame, ProtocolError, RemoteDescriptor, ServerFrame,
    SessionFrame, SessionId,
};
use serde_json::{json, Value};

#[test]
fn connect_with_name_and_games() {
    let line = r#"{"type":"connect","name":"alice","max_games":3,"supported_games":["tictactoe"]}"#;
    let req = ConnectRequest::parse(line).unwrap();

    assert_eq!(req.name.as_deref(), Some("alice"));
    assert_eq!(req.max_games, 3);
    assert_eq!(req.supported_games, vec!["tictactoe".to_string()]);
}

#[test]
fn connect_without_name_or_games() {
    let req = ConnectRequest::parse(r#"{"type":"connect","name":null,"max_games":"2"}"#).unwrap();

    assert_eq!(req.name, None);
    assert_eq!(req.max_games, 2);
    assert!(req.supported_games.is_empty());

    // null list is the same as an empty one
    let req = ConnectRequest::parse(
        r#"{"type":"connect","max_games":1,"supported_games":null}"#,
    )
    .unwrap();
    assert!(req.supported_games.is_empty());
}

#[test]
fn connect_rejects_bad_max_games() {
    for bad in [r#""many""#, "-1", "1.5", "null", "[]"] {
        let line = format!(r#"{{"type":"connect","name":"x","max_games":{bad}}}"#);
        let err = ConnectRequest::parse(&line).unwrap_err();
        assert!(
            matches!(err, ProtocolError::InvalidMaxGames(_)),
            "{bad} gave {err:?}"
        );
    }

    // missing entirely
    assert!(matches!(
        ConnectRequest::parse(r#"{"type":"connect","name":"x"}"#),
        Err(ProtocolError::InvalidMaxGames(_))
    ));
}

#[test]
fn connect_rejects_wrong_type_and_garbage() {
    assert!(matches!(
        ConnectRequest::parse(r#"{"type":"hello","max_games":1}"#),
        Err(ProtocolError::UnexpectedType { .. })
    ));
    assert!(matches!(
        ConnectRequest::parse("not json"),
        Err(ProtocolError::Json(_))
    ));
    assert!(matches!(
        ConnectRequest::parse("[1,2]"),
        Err(ProtocolError::NotAnObject)
    ));
}

#[test]
fn server_frames_match_the_wire() {
    let name: Value = serde_json::from_str(&ServerFrame::Name { name: "bob".into() }.to_line()).unwrap();
    assert_eq!(name, json!({"type": "name", "name": "bob"}));

    let start: Value =
        serde_json::from_str(&ServerFrame::Start { game_id: SessionId(7) }.to_line()).unwrap();
    assert_eq!(start, json!({"type": "start", "game_id": 7}));

    let close: Value =
        serde_json::from_str(&ServerFrame::Close { game_id: None }.to_line()).unwrap();
    assert_eq!(close, json!({"type": "close"}));

    // the tag leads, and a session close keeps its id
    let line = ServerFrame::Close { game_id: Some(SessionId(3)) }.to_line();
    assert_eq!(line, r#"{"type":"close","game_id":3}"#);
    assert_eq!(
        serde_json::from_str::<ServerFrame>(&line).unwrap(),
        ServerFrame::Close { game_id: Some(SessionId(3)) }
    );
}

#[test]
fn session_frame_strips_game_id() {
    let frame =
        SessionFrame::parse(r#"{"type":"message","game_id":4,"payload":{"row":1,"column":2}}"#)
            .unwrap();

    assert_eq!(frame.game_id, Some(SessionId(4)));
    assert!(!frame.is_close());

    let body: Value = serde_json::from_str(&frame.body_line()).unwrap();
    assert_eq!(body, json!({"type": "message", "payload": {"row": 1, "column": 2}}));
}

#[test]
fn session_frame_close_variants() {
    let whole = SessionFrame::parse(r#"{"type":"close"}"#).unwrap();
    assert!(whole.is_close());
    assert_eq!(whole.game_id, None);

    let one = SessionFrame::parse(r#"{"type":"close","game_id":0}"#).unwrap();
    assert!(one.is_close());
    assert_eq!(one.game_id, Some(SessionId(0)));

    assert!(matches!(
        SessionFrame::parse(r#"{"type":"close","game_id":"zero"}"#),
        Err(ProtocolError::InvalidSessionId(_))
    ));
}

#[test]
fn tagging_injects_and_overrides_game_id() {
    let tagged = tag_with_session(r#"{"type":"message","payload":{"a":1}}"#, SessionId(9)).unwrap();
    let value: Value = serde_json::from_str(&tagged).unwrap();
    assert_eq!(value, json!({"type": "message", "payload": {"a": 1}, "game_id": 9}));

    let spoofed = tag_with_session(r#"{"type":"close","game_id":1}"#, SessionId(2)).unwrap();
    let value: Value = serde_json::from_str(&spoofed).unwrap();
    assert_eq!(value["game_id"], json!(2));

    assert!(tag_with_session("42", SessionId(1)).is_err());
}

#[test]
fn engine_frames() {
    let msg = EngineFrame::message(json!({"type": "turn"}));
    assert_eq!(EngineFrame::parse(&msg.to_line()).unwrap(), msg);
    assert!(EngineFrame::parse(r#"{"type":"close"}"#).unwrap().is_close());
    assert!(EngineFrame::parse(r#"{"type":"bogus"}"#).is_err());

    assert!(is_close_line("{\"type\":\"close\"}\n"));
    assert!(!is_close_line(r#"{"type":"message","payload":null}"#));
    assert!(!is_close_line("garbage"));
}

#[test]
fn descriptors_parse_back() {
    let pipe: RemoteDescriptor = "pipe:5,6".parse().unwrap();
    assert_eq!(pipe, RemoteDescriptor::Pipe { read_fd: 5, write_fd: 6 });
    assert_eq!(pipe.to_string(), "pipe:5,6");

    let tcp: RemoteDescriptor = "tcp:40123".parse().unwrap();
    assert_eq!(tcp, RemoteDescriptor::Socket { port: 40123 });
    assert_eq!(tcp.to_string(), "tcp:40123");

    for bad in ["", "pipe:5", "pipe:-1,2", "tcp:0", "tcp:70000", "udp:5"] {
        assert!(bad.parse::<RemoteDescriptor>().is_err(), "{bad} parsed");
    }
}
