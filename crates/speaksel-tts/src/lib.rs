//! Text-to-speech abstraction layer for speaksel
//!
//! This crate provides the foundational types and traits for speaking text
//! aloud: the engine trait, per-utterance speech parameters, the persisted
//! settings record, and the asynchronous utterance lifecycle events.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod engine;
pub mod error;
pub mod types;

pub use engine::{EventSender, TtsEngine, UtteranceEvent, UtteranceUpdate};
pub use error::{TtsError, TtsResult};
pub use types::{clamp_rate, SpeechParams, SpeechSettings, VoiceInfo};
pub use types::{MAX_RATE, MIN_RATE, RATE_STEP};

/// Generates unique utterance IDs
static UTTERANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a unique utterance ID
///
/// Every speak attempt gets a fresh ID, including the restart half of a
/// rate change. IDs are process-wide monotonic so a later attempt always
/// carries a larger tag than the one it supersedes.
pub fn next_utterance_id() -> u64 {
    UTTERANCE_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}
