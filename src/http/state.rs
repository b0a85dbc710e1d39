use crate::config::Config;
use crate::join::MeetingJoiner;
use crate::session::SessionHandle;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// The join/automation collaborator
    pub joiner: Arc<dyn MeetingJoiner>,

    /// Known sessions (session_id -> handle), terminal ones included so
    /// their state and reports stay queryable
    pub sessions: Arc<RwLock<HashMap<String, Arc<SessionHandle>>>>,
}

impl AppState {
    pub fn new(config: Config, joiner: Arc<dyn MeetingJoiner>) -> Self {
        Self {
            config: Arc::new(config),
            joiner,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}
