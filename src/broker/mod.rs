pub mod client;
pub mod messages;

pub use client::{ChunkPublisher, NatsPublisher};
pub use messages::AudioChunkMessage;
