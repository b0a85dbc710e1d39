pub mod broker;
pub mod capture;
pub mod config;
pub mod http;
pub mod join;
pub mod session;

pub use broker::{AudioChunkMessage, ChunkPublisher, NatsPublisher};
pub use capture::{
    CaptureSource, Chunk, ChunkArchive, ChunkSegmenter, FfmpegSource, SourceEvent,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use join::{HelperJoiner, JoinedMeeting, MeetingJoiner};
pub use session::{
    ClosingReport, EndReason, LivenessMonitor, RespondOn, ResponseLatch, SessionConfig,
    SessionCoordinator, SessionError, SessionHandle, SessionOutcome, SessionState, SessionStatus,
};
