use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use super::report::ClosingReport;

/// Terminal answer delivered to the caller that started the session.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The session reached ACTIVE (answered at join time)
    Started { session_id: String },
    /// The session reached CLOSED (answered at session end)
    Closed(Box<ClosingReport>),
}

/// Single-shot gate over the caller's response channel.
///
/// Stream exit, the liveness signal and publish failures are independent
/// concurrent activities that could each try to answer the caller. Whichever
/// outcome reaches the latch first wins; every later attempt is a no-op.
pub struct ResponseLatch {
    tx: Mutex<Option<oneshot::Sender<SessionOutcome>>>,
}

impl ResponseLatch {
    pub fn new() -> (Self, oneshot::Receiver<SessionOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Deliver the outcome unless someone already has. Returns whether this
    /// call won the latch.
    pub fn resolve(&self, outcome: SessionOutcome) -> bool {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match tx {
            Some(tx) => {
                // The receiver may have stopped waiting; the latch is spent
                // either way
                let _ = tx.send(outcome);
                true
            }
            None => {
                debug!("Response already sent, ignoring late outcome");
                false
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}
