//! Session lifecycle management
//!
//! This module owns one capture session end-to-end:
//! - `SessionCoordinator` wires capture -> segmenter -> publisher and drives
//!   the ACTIVE -> DRAINING -> CLOSED shutdown sequence exactly once
//! - `LivenessMonitor` polls the meeting liveness predicate with a sticky
//!   end-of-session signal
//! - `ResponseLatch` guarantees the initiating caller is answered exactly once
//! - `ClosingReport`/`SessionStatus` are the externally visible outcomes

mod config;
mod coordinator;
mod error;
mod latch;
mod monitor;
mod report;

pub use config::{RespondOn, SessionConfig};
pub use coordinator::{SessionCoordinator, SessionHandle};
pub use error::SessionError;
pub use latch::{ResponseLatch, SessionOutcome};
pub use monitor::LivenessMonitor;
pub use report::{ClosingReport, EndReason, SessionState, SessionStatus};
