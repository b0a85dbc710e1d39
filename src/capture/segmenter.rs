use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One ordered, immutable unit of captured payload.
///
/// Sequence numbers for a session are gap-free and ascending from 0, and
/// exactly one chunk carries `is_final = true` — always the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub session_id: String,
    pub sequence: u64,
    pub is_final: bool,
    pub payload: Vec<u8>,
}

/// Splits an incoming byte stream into fixed-duration windows.
///
/// Purely time-windowed: a window emits once `window` has elapsed since its
/// first byte, whatever its size, so a silent or low-rate stream still emits
/// on schedule. There is no size-based trigger.
pub struct ChunkSegmenter {
    session_id: String,
    window: Duration,
    accumulated: Vec<u8>,
    window_start: Instant,
    next_sequence: u64,
    finished: bool,
}

impl ChunkSegmenter {
    pub fn new(session_id: impl Into<String>, window: Duration) -> Self {
        Self {
            session_id: session_id.into(),
            window,
            accumulated: Vec::new(),
            window_start: Instant::now(),
            next_sequence: 0,
            finished: false,
        }
    }

    /// Feed newly captured bytes. Returns a chunk when the current window
    /// has expired.
    pub fn append(&mut self, bytes: &[u8]) -> Option<Chunk> {
        if self.finished {
            warn!(
                "Segmenter for {} already flushed, dropping {} bytes",
                self.session_id,
                bytes.len()
            );
            return None;
        }

        // The window is measured from its first byte
        if self.accumulated.is_empty() && !bytes.is_empty() {
            self.window_start = Instant::now();
        }
        self.accumulated.extend_from_slice(bytes);

        self.rotate_if_expired()
    }

    /// Wall-clock check, driven by the coordinator's interval timer so that
    /// emission does not depend on an append landing after the window
    /// boundary.
    pub fn tick(&mut self) -> Option<Chunk> {
        if self.finished {
            return None;
        }
        self.rotate_if_expired()
    }

    /// Emit whatever is buffered (possibly nothing) as the final chunk,
    /// regardless of elapsed window time, and retire the segmenter.
    ///
    /// Callable at most once; later calls (and later appends) are ignored
    /// with a warning rather than panicking inside a live recording.
    pub fn flush_final(&mut self) -> Option<Chunk> {
        if self.finished {
            warn!("Final chunk already emitted for {}", self.session_id);
            return None;
        }
        self.finished = true;
        Some(self.emit(true))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes currently buffered in the open window
    pub fn buffered_len(&self) -> usize {
        self.accumulated.len()
    }

    fn rotate_if_expired(&mut self) -> Option<Chunk> {
        if !self.accumulated.is_empty() && self.window_start.elapsed() >= self.window {
            Some(self.emit(false))
        } else {
            None
        }
    }

    fn emit(&mut self, is_final: bool) -> Chunk {
        let payload = std::mem::take(&mut self.accumulated);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.window_start = Instant::now();

        debug!(
            "Emitting chunk {} for {} ({} bytes, final={})",
            sequence,
            self.session_id,
            payload.len(),
            is_final
        );

        Chunk {
            session_id: self.session_id.clone(),
            sequence,
            is_final,
            payload,
        }
    }
}
