use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::capture::Chunk;

/// Audio chunk message published to the broker.
///
/// Consumers must treat `is_last_chunk: true` as the authoritative
/// end-of-stream marker for a given `session_id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioChunkMessage {
    pub session_id: String,
    pub chunk_id: u64,
    pub is_last_chunk: bool,
    /// Base64-encoded audio payload
    pub audio_chunk: String,
}

impl AudioChunkMessage {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            session_id: chunk.session_id.clone(),
            chunk_id: chunk.sequence,
            is_last_chunk: chunk.is_final,
            audio_chunk: base64::engine::general_purpose::STANDARD.encode(&chunk.payload),
        }
    }

    pub fn decode_payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.audio_chunk)
    }
}
