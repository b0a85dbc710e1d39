//! HTTP API server for session control
//!
//! This module provides the REST surface in front of the pipeline:
//! - POST /sessions/start - Join a meeting and start relaying its audio
//! - POST /sessions/:id/stop - End a session and return its closing report
//! - GET /sessions/:id/status - Query session status
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
