// Integration tests for the session coordinator
//
// These drive a full session lifecycle against scripted collaborators: a
// channel-fed capture source, a recording publisher and a scripted meeting.
// The tokio clock is paused so window expiry and poll intervals run
// deterministically.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use meeting_relay::broker::ChunkPublisher;
use meeting_relay::capture::{CaptureSource, Chunk, SourceEvent};
use meeting_relay::join::JoinedMeeting;
use meeting_relay::session::{
    EndReason, LivenessMonitor, RespondOn, ResponseLatch, SessionConfig, SessionCoordinator,
    SessionError, SessionOutcome, SessionState,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

// ============================================================================
// Scripted collaborators
// ============================================================================

struct ScriptedSource {
    rx: Option<mpsc::Receiver<SourceEvent>>,
    tx: mpsc::Sender<SourceEvent>,
    running: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new() -> (Self, mpsc::Sender<SourceEvent>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel(64);
        let running = Arc::new(AtomicBool::new(true));
        let source = Self {
            rx: Some(rx),
            tx: tx.clone(),
            running: Arc::clone(&running),
        };
        (source, tx, running)
    }
}

#[async_trait]
impl CaptureSource for ScriptedSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<SourceEvent>> {
        self.rx
            .take()
            .ok_or_else(|| anyhow!("source already started"))
    }

    async fn stop(&mut self) -> Result<()> {
        // The scripted encoder acknowledges the kill by reporting exit
        if self.running.swap(false, Ordering::SeqCst) {
            let _ = self.tx.send(SourceEvent::Exited(Some(0))).await;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct FailingSource;

#[async_trait]
impl CaptureSource for FailingSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<SourceEvent>> {
        Err(anyhow!("capture device unavailable"))
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_running(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[derive(Clone)]
struct RecordingPublisher {
    published: Arc<Mutex<Vec<Chunk>>>,
    close_calls: Arc<AtomicUsize>,
    fail_non_final: Arc<AtomicBool>,
}

impl RecordingPublisher {
    fn new() -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            close_calls: Arc::new(AtomicUsize::new(0)),
            fail_non_final: Arc::new(AtomicBool::new(false)),
        }
    }

    fn published(&self) -> Vec<Chunk> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChunkPublisher for RecordingPublisher {
    async fn publish(&mut self, chunk: &Chunk) -> Result<()> {
        if self.fail_non_final.load(Ordering::SeqCst) && !chunk.is_final {
            return Err(anyhow!("broker unavailable"));
        }
        self.published.lock().unwrap().push(chunk.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedMeeting {
    alive: AtomicBool,
    probe_script: Mutex<VecDeque<Result<bool>>>,
    left: AtomicUsize,
}

impl ScriptedMeeting {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(true),
            probe_script: Mutex::new(VecDeque::new()),
            left: AtomicUsize::new(0),
        })
    }

    fn end_meeting(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Queue probe results consumed before the `alive` flag is consulted
    fn script_probe(&self, results: Vec<Result<bool>>) {
        self.probe_script.lock().unwrap().extend(results);
    }
}

#[async_trait]
impl JoinedMeeting for ScriptedMeeting {
    async fn is_alive(&self) -> Result<bool> {
        if let Some(result) = self.probe_script.lock().unwrap().pop_front() {
            return result;
        }
        Ok(self.alive.load(Ordering::SeqCst))
    }

    async fn leave(&self) -> Result<()> {
        self.left.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn test_config(respond_on: RespondOn) -> SessionConfig {
    SessionConfig {
        session_id: "session-test".to_string(),
        window: Duration::from_secs(15),
        poll_interval: Duration::from_secs(5),
        respond_on,
        archive_dir: None,
    }
}

// ============================================================================
// Lifecycle tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_meeting_end_publishes_final_chunk_last() {
    let meeting = ScriptedMeeting::new();
    let (source, feed, _running) = ScriptedSource::new();
    let publisher = RecordingPublisher::new();

    let (handle, outcome_rx) = SessionCoordinator::start(
        test_config(RespondOn::Closed),
        meeting.clone(),
        Box::new(source),
        Box::new(publisher.clone()),
    )
    .await
    .expect("session should start");

    assert_eq!(handle.state(), SessionState::Active);

    // One full window of data, then the meeting ends
    feed.send(SourceEvent::Data(vec![1u8; 1000])).await.unwrap();
    sleep(Duration::from_secs(16)).await;
    meeting.end_meeting();

    let report = match outcome_rx.await.expect("outcome should arrive") {
        SessionOutcome::Closed(report) => *report,
        other => panic!("Expected closing report, got {:?}", other),
    };

    let published = publisher.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].sequence, 0);
    assert!(!published[0].is_final);
    assert_eq!(published[0].payload.len(), 1000);
    assert_eq!(published[1].sequence, 1);
    assert!(published[1].is_final);
    assert!(published[1].payload.is_empty());

    assert_eq!(report.end_reason, EndReason::MeetingEnded);
    assert_eq!(report.chunks_published, 2);
    assert_eq!(report.publish_failures, 0);
    assert!(report.final_publish_ok);

    assert_eq!(handle.state(), SessionState::Closed);
    assert_eq!(publisher.close_calls.load(Ordering::SeqCst), 1);
    assert_eq!(meeting.left.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_encoder_exit_flushes_buffered_bytes() {
    let meeting = ScriptedMeeting::new();
    let (source, feed, running) = ScriptedSource::new();
    let publisher = RecordingPublisher::new();

    let (handle, outcome_rx) = SessionCoordinator::start(
        test_config(RespondOn::Closed),
        meeting.clone(),
        Box::new(source),
        Box::new(publisher.clone()),
    )
    .await
    .expect("session should start");

    // 400 bytes arrive, then the encoder dies mid-window
    feed.send(SourceEvent::Data(vec![9u8; 400])).await.unwrap();
    running.store(false, Ordering::SeqCst);
    feed.send(SourceEvent::Exited(Some(0))).await.unwrap();

    let report = match outcome_rx.await.expect("outcome should arrive") {
        SessionOutcome::Closed(report) => *report,
        other => panic!("Expected closing report, got {:?}", other),
    };

    // The buffered bytes still go out, as the final chunk
    let published = publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].sequence, 0);
    assert!(published[0].is_final);
    assert_eq!(published[0].payload.len(), 400);

    assert_eq!(
        report.end_reason,
        EndReason::StreamEnded { exit_code: Some(0) }
    );
    assert_eq!(handle.state(), SessionState::Closed);
    assert_eq!(meeting.left.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_respond_on_joined_acknowledges_immediately() {
    let meeting = ScriptedMeeting::new();
    let (source, _feed, _running) = ScriptedSource::new();
    let publisher = RecordingPublisher::new();

    let (handle, outcome_rx) = SessionCoordinator::start(
        test_config(RespondOn::Joined),
        meeting.clone(),
        Box::new(source),
        Box::new(publisher.clone()),
    )
    .await
    .expect("session should start");

    // The caller is answered at join time, however long the session runs
    match outcome_rx.await.expect("outcome should arrive") {
        SessionOutcome::Started { session_id } => assert_eq!(session_id, "session-test"),
        other => panic!("Expected join acknowledgment, got {:?}", other),
    }
    assert_eq!(handle.state(), SessionState::Active);

    // A later shutdown still produces a report through the handle, and the
    // latch stays spent
    handle.request_stop();
    let report = handle.wait_closed().await.expect("report should be stored");
    assert_eq!(report.end_reason, EndReason::StopRequested);
    assert_eq!(meeting.left.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_degraded_monitor_ends_session() {
    let meeting = ScriptedMeeting::new();
    meeting.script_probe(vec![Err(anyhow!("unreachable")), Err(anyhow!("unreachable"))]);

    let (source, _feed, _running) = ScriptedSource::new();
    let publisher = RecordingPublisher::new();

    let (_handle, outcome_rx) = SessionCoordinator::start(
        test_config(RespondOn::Closed),
        meeting.clone(),
        Box::new(source),
        Box::new(publisher.clone()),
    )
    .await
    .expect("session should start");

    let report = match outcome_rx.await.expect("outcome should arrive") {
        SessionOutcome::Closed(report) => *report,
        other => panic!("Expected closing report, got {:?}", other),
    };

    // Two consecutive predicate failures degrade to an end-of-session
    // signal instead of hanging the session
    assert_eq!(report.end_reason, EndReason::MonitorDegraded);

    let published = publisher.published();
    assert_eq!(published.len(), 1);
    assert!(published[0].is_final);
    assert_eq!(meeting.left.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_does_not_abort_session() {
    let meeting = ScriptedMeeting::new();
    let (source, feed, _running) = ScriptedSource::new();
    let publisher = RecordingPublisher::new();
    publisher.fail_non_final.store(true, Ordering::SeqCst);

    let (handle, outcome_rx) = SessionCoordinator::start(
        test_config(RespondOn::Closed),
        meeting.clone(),
        Box::new(source),
        Box::new(publisher.clone()),
    )
    .await
    .expect("session should start");

    feed.send(SourceEvent::Data(vec![1u8; 1000])).await.unwrap();
    sleep(Duration::from_secs(16)).await;
    meeting.end_meeting();

    let report = match outcome_rx.await.expect("outcome should arrive") {
        SessionOutcome::Closed(report) => *report,
        other => panic!("Expected closing report, got {:?}", other),
    };

    // The rejected window chunk is counted, the final publish still happens
    // and the session still closes cleanly
    assert_eq!(report.publish_failures, 1);
    assert_eq!(report.chunks_published, 1);
    assert!(report.final_publish_ok);

    let published = publisher.published();
    assert_eq!(published.len(), 1);
    assert!(published[0].is_final);

    assert_eq!(handle.state(), SessionState::Closed);
    assert_eq!(publisher.close_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_chunk_ordering_across_windows() {
    let meeting = ScriptedMeeting::new();
    let (source, feed, _running) = ScriptedSource::new();
    let publisher = RecordingPublisher::new();

    let (handle, _outcome_rx) = SessionCoordinator::start(
        test_config(RespondOn::Joined),
        meeting.clone(),
        Box::new(source),
        Box::new(publisher.clone()),
    )
    .await
    .expect("session should start");

    for _ in 0..3 {
        feed.send(SourceEvent::Data(vec![5u8; 500])).await.unwrap();
        sleep(Duration::from_secs(15)).await;
    }

    handle.request_stop();
    let report = handle.wait_closed().await.expect("report should be stored");

    // Gap-free ascending sequence numbers, exactly one final chunk, always
    // published last, no bytes lost
    let published = publisher.published();
    assert!(published.len() >= 2);
    for (i, chunk) in published.iter().enumerate() {
        assert_eq!(chunk.sequence, i as u64);
        assert_eq!(chunk.is_final, i == published.len() - 1);
    }
    let total: usize = published.iter().map(|c| c.payload.len()).sum();
    assert_eq!(total, 1500);
    assert_eq!(report.chunks_published as usize, published.len());

    // A second stop request is a no-op and the stored report is stable
    handle.request_stop();
    let again = handle.wait_closed().await.expect("report should persist");
    assert_eq!(again.end_reason, report.end_reason);
}

#[tokio::test]
async fn test_acquisition_failure_releases_resources() {
    let meeting = ScriptedMeeting::new();
    let publisher = RecordingPublisher::new();

    let result = SessionCoordinator::start(
        test_config(RespondOn::Joined),
        meeting.clone(),
        Box::new(FailingSource),
        Box::new(publisher.clone()),
    )
    .await;

    let err = match result {
        Err(err) => err,
        Ok(_) => panic!("Start should fail when the encoder cannot be acquired"),
    };
    match err {
        SessionError::Acquisition { resource, .. } => assert_eq!(resource, "encoder"),
        other => panic!("Expected acquisition error, got {}", other),
    }

    // Both already-acquired resources are released on the failure path
    assert_eq!(publisher.close_calls.load(Ordering::SeqCst), 1);
    assert_eq!(meeting.left.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Monitor timing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_monitor_signals_on_fourth_poll() {
    let meeting = ScriptedMeeting::new();
    meeting.script_probe(vec![Ok(true), Ok(true), Ok(true), Ok(false)]);

    let started = tokio::time::Instant::now();
    let reason = LivenessMonitor::new(meeting, Duration::from_secs(5))
        .watch()
        .await;

    assert_eq!(reason, EndReason::MeetingEnded);
    // Three healthy polls, then the end signal one interval later
    assert_eq!(started.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_recovers_after_single_probe_failure() {
    let meeting = ScriptedMeeting::new();
    meeting.script_probe(vec![Err(anyhow!("flaky")), Ok(true), Ok(false)]);

    let reason = LivenessMonitor::new(meeting, Duration::from_secs(5))
        .watch()
        .await;

    // One failure is retried; the healthy poll clears it, so the end is
    // reported as a normal meeting end
    assert_eq!(reason, EndReason::MeetingEnded);
}

// ============================================================================
// Response latch
// ============================================================================

#[tokio::test]
async fn test_response_latch_resolves_exactly_once() {
    let (latch, rx) = ResponseLatch::new();
    let latch = Arc::new(latch);
    let wins = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let latch = Arc::clone(&latch);
        let wins = Arc::clone(&wins);
        tasks.push(tokio::spawn(async move {
            let outcome = SessionOutcome::Started {
                session_id: format!("session-{}", i),
            };
            if latch.resolve(outcome) {
                wins.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(wins.load(Ordering::SeqCst), 1);
    assert!(latch.is_resolved());
    assert!(matches!(rx.await, Ok(SessionOutcome::Started { .. })));
}
