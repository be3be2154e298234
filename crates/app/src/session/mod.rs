//! Speech session management
//!
//! At most one utterance is tracked at any time, globally: new speech
//! replaces old, and every flow that resumes after a suspension re-checks
//! the record before touching it.

pub mod controller;
pub mod record;

pub use controller::{
    ControllerConfig, ControllerHandle, PendingResponse, SessionController, SessionMetrics,
};
pub use record::{SessionRecord, SessionState};
