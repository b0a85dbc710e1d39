use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// When the HTTP caller is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RespondOn {
    /// Acknowledge as soon as the session is active
    #[default]
    Joined,
    /// Withhold the response until the closing report is ready
    Closed,
}

/// Configuration for one capture session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// Duration of each chunk window
    pub window: Duration,

    /// Liveness polling interval
    pub poll_interval: Duration,

    pub respond_on: RespondOn,

    /// When set, chunk payloads are also appended to a local file here
    pub archive_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            window: Duration::from_secs(15),
            poll_interval: Duration::from_secs(5),
            respond_on: RespondOn::Joined,
            archive_dir: None,
        }
    }
}
