use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time;
use tracing::{error, info, warn};

use super::config::{RespondOn, SessionConfig};
use super::error::SessionError;
use super::latch::{ResponseLatch, SessionOutcome};
use super::monitor::LivenessMonitor;
use super::report::{ClosingReport, EndReason, SessionState, SessionStatus};
use crate::broker::ChunkPublisher;
use crate::capture::{CaptureSource, Chunk, ChunkArchive, ChunkSegmenter, SourceEvent};
use crate::join::JoinedMeeting;

/// Cadence at which the open window is checked for expiry, so a silent
/// stream still emits on schedule.
const WINDOW_TICK: Duration = Duration::from_secs(1);

/// Upper bound on the wait for the encoder to exit once told to stop.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared view of a session, kept in the HTTP registry.
pub struct SessionHandle {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    state: watch::Receiver<SessionState>,
    chunks_published: Arc<AtomicU64>,
    stop_tx: mpsc::Sender<()>,
    report: Arc<Mutex<Option<ClosingReport>>>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn status(&self) -> SessionStatus {
        let now = Utc::now();
        SessionStatus {
            session_id: self.session_id.clone(),
            state: self.state(),
            started_at: self.started_at,
            duration_secs: now.signed_duration_since(self.started_at).num_milliseconds() as f64
                / 1000.0,
            chunks_published: self.chunks_published.load(Ordering::SeqCst),
        }
    }

    /// Ask the session to drain. A no-op once the first request is in.
    pub fn request_stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Wait until the session reaches a terminal state, then return the
    /// closing report (absent when the session failed before closing).
    pub async fn wait_closed(&self) -> Option<ClosingReport> {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| s.is_terminal()).await;
        self.report()
    }

    pub fn report(&self) -> Option<ClosingReport> {
        self.report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Registry tombstone for a session that failed during startup.
    pub fn failed(session_id: String) -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(SessionState::Failed);
        drop(state_tx);
        let (stop_tx, _) = mpsc::channel(1);

        Arc::new(Self {
            session_id,
            started_at: Utc::now(),
            state: state_rx,
            chunks_published: Arc::new(AtomicU64::new(0)),
            stop_tx,
            report: Arc::new(Mutex::new(None)),
        })
    }
}

/// Orchestrates one complete session lifecycle: wires the capture source
/// through the segmenter into the publisher, runs the liveness monitor
/// concurrently, and drives ACTIVE -> DRAINING -> CLOSED exactly once.
pub struct SessionCoordinator;

impl SessionCoordinator {
    /// Complete the STARTING phase and spawn the session's run loop.
    ///
    /// The meeting and broker resources are acquired by the caller; this
    /// starts the encoder and transitions the session to ACTIVE. On failure
    /// both already-acquired resources are released and the session never
    /// becomes active.
    pub async fn start(
        config: SessionConfig,
        meeting: Arc<dyn JoinedMeeting>,
        mut source: Box<dyn CaptureSource>,
        mut publisher: Box<dyn ChunkPublisher>,
    ) -> Result<(Arc<SessionHandle>, oneshot::Receiver<SessionOutcome>), SessionError> {
        let events = match source.start().await {
            Ok(events) => events,
            Err(e) => {
                if let Err(close_err) = publisher.close().await {
                    warn!("Failed to release broker connection: {}", close_err);
                }
                if let Err(leave_err) = meeting.leave().await {
                    warn!("Failed to release meeting resource: {}", leave_err);
                }
                return Err(SessionError::Acquisition {
                    resource: "encoder",
                    source: e,
                });
            }
        };

        let started_at = Utc::now();
        let (state_tx, state_rx) = watch::channel(SessionState::Starting);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let (latch, outcome_rx) = ResponseLatch::new();
        let chunks_published = Arc::new(AtomicU64::new(0));
        let report_slot = Arc::new(Mutex::new(None));

        let handle = Arc::new(SessionHandle {
            session_id: config.session_id.clone(),
            started_at,
            state: state_rx,
            chunks_published: Arc::clone(&chunks_published),
            stop_tx,
            report: Arc::clone(&report_slot),
        });

        state_tx.send_replace(SessionState::Active);
        info!("Session {} is active ({})", config.session_id, source.name());

        if config.respond_on == RespondOn::Joined {
            latch.resolve(SessionOutcome::Started {
                session_id: config.session_id.clone(),
            });
        }

        let runner = SessionRunner {
            config,
            meeting,
            source,
            publisher,
            events,
            state_tx,
            stop_rx,
            latch,
            chunks_published,
            started_at,
            report_slot,
        };
        tokio::spawn(runner.run());

        Ok((handle, outcome_rx))
    }
}

struct SessionRunner {
    config: SessionConfig,
    meeting: Arc<dyn JoinedMeeting>,
    source: Box<dyn CaptureSource>,
    publisher: Box<dyn ChunkPublisher>,
    events: mpsc::Receiver<SourceEvent>,
    state_tx: watch::Sender<SessionState>,
    stop_rx: mpsc::Receiver<()>,
    latch: ResponseLatch,
    chunks_published: Arc<AtomicU64>,
    started_at: DateTime<Utc>,
    report_slot: Arc<Mutex<Option<ClosingReport>>>,
}

impl SessionRunner {
    async fn run(self) {
        let SessionRunner {
            config,
            meeting,
            mut source,
            mut publisher,
            mut events,
            state_tx,
            mut stop_rx,
            latch,
            chunks_published,
            started_at,
            report_slot,
        } = self;

        let mut segmenter = ChunkSegmenter::new(config.session_id.clone(), config.window);
        let mut publish_failures: u64 = 0;

        let mut archive = match &config.archive_dir {
            Some(dir) => match ChunkArchive::create(dir, &config.session_id).await {
                Ok(archive) => Some(archive),
                Err(e) => {
                    warn!("Archive disabled: {}", e);
                    None
                }
            },
            None => None,
        };

        let monitor = LivenessMonitor::new(Arc::clone(&meeting), config.poll_interval);
        let mut monitor_task = tokio::spawn(monitor.watch());

        let mut ticker = time::interval(WINDOW_TICK);
        let mut stop_open = true;

        // ACTIVE: interleave byte events, window checks, the liveness
        // signal and operator stop requests
        let end_reason = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(SourceEvent::Data(bytes)) => {
                        if let Some(chunk) = segmenter.append(&bytes) {
                            deliver(
                                publisher.as_mut(),
                                &mut archive,
                                &chunks_published,
                                &mut publish_failures,
                                &chunk,
                            )
                            .await;
                        }
                    }
                    Some(SourceEvent::Exited(code)) => {
                        warn!("{}", SessionError::StreamInterrupted { code });
                        break EndReason::StreamEnded { exit_code: code };
                    }
                    None => {
                        warn!("Capture stream closed without exit notice");
                        break EndReason::StreamEnded { exit_code: None };
                    }
                },
                _ = ticker.tick() => {
                    if let Some(chunk) = segmenter.tick() {
                        deliver(
                            publisher.as_mut(),
                            &mut archive,
                            &chunks_published,
                            &mut publish_failures,
                            &chunk,
                        )
                        .await;
                    }
                }
                reason = &mut monitor_task => {
                    break match reason {
                        Ok(reason) => reason,
                        Err(e) => {
                            warn!("Liveness monitor task failed: {}", e);
                            EndReason::MonitorDegraded
                        }
                    };
                }
                req = stop_rx.recv(), if stop_open => match req {
                    Some(()) => {
                        info!("Stop requested for session {}", config.session_id);
                        break EndReason::StopRequested;
                    }
                    None => stop_open = false,
                },
            }
        };

        info!("Session {} draining ({:?})", config.session_id, end_reason);
        state_tx.send_replace(SessionState::Draining);
        monitor_task.abort();

        // Tell the encoder to stop; bytes it already produced still reach
        // the buffer and are flushed below
        if source.is_running() {
            if let Err(e) = source.stop().await {
                warn!("Failed to stop encoder: {}", e);
            }

            let drain = async {
                while let Some(event) = events.recv().await {
                    match event {
                        SourceEvent::Data(bytes) => {
                            if let Some(chunk) = segmenter.append(&bytes) {
                                deliver(
                                    publisher.as_mut(),
                                    &mut archive,
                                    &chunks_published,
                                    &mut publish_failures,
                                    &chunk,
                                )
                                .await;
                            }
                        }
                        SourceEvent::Exited(code) => {
                            info!("Encoder stopped (code {:?})", code);
                            break;
                        }
                    }
                }
            };
            if time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
                warn!("Timed out waiting for encoder exit, flushing buffered bytes");
            }
        }

        // Whatever remains goes out as the final chunk; an empty payload is
        // still a valid end-of-stream marker downstream
        let final_publish_ok = match segmenter.flush_final() {
            Some(chunk) => {
                deliver(
                    publisher.as_mut(),
                    &mut archive,
                    &chunks_published,
                    &mut publish_failures,
                    &chunk,
                )
                .await
            }
            None => false,
        };

        if let Some(archive) = archive.as_mut() {
            if let Err(e) = archive.flush().await {
                warn!("Archive flush failed: {}", e);
            }
        }

        if let Err(e) = publisher.close().await {
            warn!("Failed to release broker connection: {}", e);
        }

        let ended_at = Utc::now();
        state_tx.send_replace(SessionState::Closed);

        // Release the automation resource exactly once
        if let Err(e) = meeting.leave().await {
            warn!("Failed to release meeting resource: {}", e);
        }

        let report = ClosingReport {
            session_id: config.session_id.clone(),
            end_reason,
            chunks_published: chunks_published.load(Ordering::SeqCst),
            publish_failures,
            final_publish_ok,
            started_at,
            ended_at,
            duration_secs: ended_at.signed_duration_since(started_at).num_milliseconds() as f64
                / 1000.0,
        };

        info!(
            "Session {} closed: {} chunks published, {} publish failures",
            config.session_id, report.chunks_published, report.publish_failures
        );

        *report_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(report.clone());

        // No-op when the caller was already answered at join time
        latch.resolve(SessionOutcome::Closed(Box::new(report)));
    }
}

/// Archive (best effort) and publish one chunk. Returns whether the broker
/// accepted it; a rejection is counted and reported, never fatal.
async fn deliver(
    publisher: &mut dyn ChunkPublisher,
    archive: &mut Option<ChunkArchive>,
    published: &AtomicU64,
    failures: &mut u64,
    chunk: &Chunk,
) -> bool {
    if let Some(archive) = archive.as_mut() {
        if let Err(e) = archive.append(&chunk.payload).await {
            warn!("Archive write failed: {}", e);
        }
    }

    match publisher.publish(chunk).await {
        Ok(()) => {
            published.fetch_add(1, Ordering::SeqCst);
            true
        }
        Err(e) => {
            *failures += 1;
            error!("{}", SessionError::Publish { source: e });
            false
        }
    }
}
