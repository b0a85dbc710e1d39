//! Audio capture pipeline
//!
//! This module provides the capture side of the relay:
//! - `CaptureSource`: lifecycle-managed external encoder process emitting a byte stream
//! - `ChunkSegmenter`: time-windowed accumulation of that stream into ordered chunks
//! - `ChunkArchive`: optional local copy of the published payloads

pub mod archive;
pub mod segmenter;
pub mod source;

pub use archive::ChunkArchive;
pub use segmenter::{Chunk, ChunkSegmenter};
pub use source::{CaptureSource, FfmpegSource, SourceEvent};
