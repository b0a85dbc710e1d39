use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{info, warn};

use super::report::EndReason;
use crate::join::JoinedMeeting;

/// Polls the meeting liveness predicate on a fixed interval and resolves
/// exactly once with the reason the meeting ended.
///
/// The signal is sticky: `watch` returns when the meeting ends and the
/// monitor never polls again, so it can never report "alive" after having
/// reported "ended". A failing predicate gets a single retry, then degrades
/// to an end-of-session signal so the coordinator shuts down instead of
/// hanging in a broken state.
pub struct LivenessMonitor {
    meeting: Arc<dyn JoinedMeeting>,
    interval: Duration,
}

impl LivenessMonitor {
    pub fn new(meeting: Arc<dyn JoinedMeeting>, interval: Duration) -> Self {
        Self { meeting, interval }
    }

    pub async fn watch(self) -> EndReason {
        let mut ticker = time::interval(self.interval);
        let mut failed_once = false;

        loop {
            ticker.tick().await;

            match self.meeting.is_alive().await {
                Ok(true) => {
                    failed_once = false;
                }
                Ok(false) => {
                    info!("Meeting has ended, signaling shutdown");
                    return EndReason::MeetingEnded;
                }
                Err(e) => {
                    if failed_once {
                        warn!(
                            "Liveness predicate failed again ({}), treating as meeting end",
                            e
                        );
                        return EndReason::MonitorDegraded;
                    }
                    warn!("Liveness predicate failed ({}), retrying once", e);
                    failed_once = true;
                }
            }
        }
    }
}
