use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a capture session.
///
/// `Starting` covers resource acquisition. `Active` is the recording phase.
/// `Draining` flushes the final chunk after end-of-session detection.
/// `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Active,
    Draining,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// Why a session left the active phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EndReason {
    /// The liveness monitor observed the meeting ending
    MeetingEnded,
    /// The liveness predicate kept failing; treated as meeting end
    MonitorDegraded,
    /// The encoder exited on its own
    StreamEnded { exit_code: Option<i32> },
    /// An operator hit the stop endpoint
    StopRequested,
}

/// Structured success/failure object produced when a session closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingReport {
    pub session_id: String,
    pub end_reason: EndReason,
    /// Chunks successfully handed to the broker, the final one included
    pub chunks_published: u64,
    /// Publish attempts the broker rejected mid-session
    pub publish_failures: u64,
    /// Whether the final chunk publish attempt succeeded
    pub final_publish_ok: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
}

/// Point-in-time view of a session, served by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub chunks_published: u64,
}
