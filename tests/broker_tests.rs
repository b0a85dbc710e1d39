use base64::Engine;
use meeting_relay::broker::{AudioChunkMessage, NatsPublisher};
use meeting_relay::capture::Chunk;

#[test]
fn test_chunk_message_serialization() {
    let chunk = Chunk {
        session_id: "session-abc".to_string(),
        sequence: 3,
        is_final: false,
        payload: vec![7u8; 100],
    };

    let msg = AudioChunkMessage::from_chunk(&chunk);
    let json = serde_json::to_string(&msg).unwrap();

    assert!(json.contains("\"session_id\":\"session-abc\""));
    assert!(json.contains("\"chunk_id\":3"));
    assert!(json.contains("\"is_last_chunk\":false"));

    let deserialized: AudioChunkMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.session_id, "session-abc");
    assert_eq!(deserialized.chunk_id, 3);
    assert!(!deserialized.is_last_chunk);
    assert_eq!(deserialized.decode_payload().unwrap(), chunk.payload);
}

#[test]
fn test_final_marker_with_empty_payload() {
    let chunk = Chunk {
        session_id: "session-abc".to_string(),
        sequence: 10,
        is_final: true,
        payload: Vec::new(),
    };

    let msg = AudioChunkMessage::from_chunk(&chunk);
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"is_last_chunk\":true"));

    let deserialized: AudioChunkMessage = serde_json::from_str(&json).unwrap();
    assert!(deserialized.is_last_chunk);
    assert!(deserialized.audio_chunk.is_empty());
    assert!(deserialized.decode_payload().unwrap().is_empty());
}

#[test]
fn test_payload_transport_encoding_roundtrip() {
    let original: Vec<u8> = (0..=255).collect();

    let chunk = Chunk {
        session_id: "session-abc".to_string(),
        sequence: 0,
        is_final: false,
        payload: original.clone(),
    };

    let msg = AudioChunkMessage::from_chunk(&chunk);

    // The payload travels text-safe
    assert_eq!(
        msg.audio_chunk,
        base64::engine::general_purpose::STANDARD.encode(&original)
    );
    assert_eq!(msg.decode_payload().unwrap(), original);
}

#[test]
fn test_subject_naming() {
    assert_eq!(
        NatsPublisher::subject_for("audio.chunks", "session-1"),
        "audio.chunks.session-1"
    );
}
