use super::state::AppState;
use crate::broker::NatsPublisher;
use crate::capture::FfmpegSource;
use crate::session::{
    ClosingReport, RespondOn, SessionConfig, SessionCoordinator, SessionError, SessionHandle,
    SessionOutcome,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Meeting link the automation helper should join
    pub meeting_link: Option<String>,

    /// Answer at join time (default) or only once the session has closed
    #[serde(default)]
    pub respond_on: RespondOn,

    /// Chunk window override in seconds
    pub window_secs: Option<u64>,

    /// Liveness poll interval override in seconds
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub status: String,
    pub report: ClosingReport,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions/start
/// Join a meeting and start relaying its audio
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    let meeting_link = match req.meeting_link.as_deref() {
        Some(link) if !link.is_empty() => link.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Meeting link is required".to_string(),
                }),
            )
                .into_response();
        }
    };

    let defaults = &state.config.session;
    let session_config = SessionConfig {
        session_id: format!("session-{}", uuid::Uuid::new_v4()),
        window: Duration::from_secs(req.window_secs.unwrap_or(defaults.window_secs)),
        poll_interval: Duration::from_secs(
            req.poll_interval_secs.unwrap_or(defaults.poll_interval_secs),
        ),
        respond_on: req.respond_on,
        archive_dir: state.config.capture.archive_dir.clone(),
    };
    let session_id = session_config.session_id.clone();

    info!("Starting session {} for {}", session_id, meeting_link);

    // STARTING: acquire the meeting, the broker connection and the encoder.
    // Any failure here answers the caller with an error and the session
    // never becomes active.
    let meeting = match state.joiner.join(&meeting_link).await {
        Ok(meeting) => meeting,
        Err(e) => {
            let err = SessionError::Acquisition {
                resource: "meeting",
                source: e,
            };
            return fail_start(&state, session_id, err).await;
        }
    };

    let subject = NatsPublisher::subject_for(&state.config.broker.subject_prefix, &session_id);
    let publisher = match NatsPublisher::connect(&state.config.broker.url, subject).await {
        Ok(publisher) => Box::new(publisher),
        Err(e) => {
            if let Err(leave_err) = meeting.leave().await {
                error!(
                    "Failed to release meeting after broker failure: {}",
                    leave_err
                );
            }
            let err = SessionError::Acquisition {
                resource: "broker",
                source: e,
            };
            return fail_start(&state, session_id, err).await;
        }
    };

    let source = Box::new(FfmpegSource::new(state.config.capture.clone()));

    let (handle, outcome_rx) =
        match SessionCoordinator::start(session_config, meeting, source, publisher).await {
            Ok(started) => started,
            Err(e) => return fail_start(&state, session_id, e).await,
        };

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), Arc::clone(&handle));
    }

    // The latch behind outcome_rx fires exactly once: at join time or at
    // session close, per respond_on
    match outcome_rx.await {
        Ok(SessionOutcome::Started { session_id }) => (
            StatusCode::OK,
            Json(StartSessionResponse {
                session_id: session_id.clone(),
                status: "active".to_string(),
                message: format!("Recording session {} is active", session_id),
            }),
        )
            .into_response(),
        Ok(SessionOutcome::Closed(report)) => (StatusCode::OK, Json(*report)).into_response(),
        Err(_) => {
            error!("Session {} ended without an outcome", session_id);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Session {} ended without an outcome", session_id),
                }),
            )
                .into_response()
        }
    }
}

/// POST /sessions/:session_id/stop
/// End a session and return its closing report
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let handle = {
        let sessions = state.sessions.read().await;
        sessions.get(&session_id).cloned()
    };

    match handle {
        Some(handle) => {
            info!("Stopping session {}", session_id);
            handle.request_stop();

            match handle.wait_closed().await {
                Some(report) => (
                    StatusCode::OK,
                    Json(StopSessionResponse {
                        session_id,
                        status: "closed".to_string(),
                        report,
                    }),
                )
                    .into_response(),
                None => (
                    StatusCode::CONFLICT,
                    Json(ErrorResponse {
                        error: format!("Session {} failed before producing a report", session_id),
                    }),
                )
                    .into_response(),
            }
        }
        None => session_not_found(&session_id),
    }
}

/// GET /sessions/:session_id/status
/// Query session status
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    match sessions.get(&session_id) {
        Some(handle) => (StatusCode::OK, Json(handle.status())).into_response(),
        None => session_not_found(&session_id),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn fail_start(state: &AppState, session_id: String, err: SessionError) -> Response {
    error!("Session {} failed to start: {}", session_id, err);

    // Keep a tombstone so status queries see the failure
    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), SessionHandle::failed(session_id));
    }

    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn session_not_found(session_id: &str) -> Response {
    error!("Session {} not found", session_id);
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Session {} not found", session_id),
        }),
    )
        .into_response()
}
