use thiserror::Error;

/// Pipeline failure taxonomy.
///
/// Only `Acquisition` reaches the caller as an error; everything after the
/// session becomes active is absorbed into the state machine and shows up in
/// the closing report instead.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A resource could not be obtained during startup; the session never
    /// becomes active.
    #[error("failed to acquire {resource}: {source}")]
    Acquisition {
        resource: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The encoder exited while the session was active.
    #[error("capture stream interrupted (exit code {code:?})")]
    StreamInterrupted { code: Option<i32> },

    /// The broker rejected a chunk or the connection dropped mid-session.
    #[error("chunk publish failed: {source}")]
    Publish {
        #[source]
        source: anyhow::Error,
    },

    /// The liveness predicate itself kept failing.
    #[error("liveness monitor degraded: {reason}")]
    MonitorDegraded { reason: String },
}
