//! Meeting join automation interface
//!
//! The browser automation that actually joins a meeting lives outside this
//! service. It is consumed through two narrow traits: something that can
//! produce a joined meeting, and the joined meeting itself, which exposes a
//! liveness predicate and a release operation.

mod helper;

pub use helper::HelperJoiner;

use anyhow::Result;
use std::sync::Arc;

/// A meeting the automation collaborator has joined.
#[async_trait::async_trait]
pub trait JoinedMeeting: Send + Sync {
    /// Liveness predicate: is the monitored meeting still active?
    async fn is_alive(&self) -> Result<bool>;

    /// Release the automation resource (close the browser). Idempotent.
    async fn leave(&self) -> Result<()>;
}

/// Produces joined meetings from meeting links.
#[async_trait::async_trait]
pub trait MeetingJoiner: Send + Sync {
    async fn join(&self, meeting_link: &str) -> Result<Arc<dyn JoinedMeeting>>;
}
