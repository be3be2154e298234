//! Error types for TTS functionality

use thiserror::Error;

/// TTS error types
#[derive(Error, Debug)]
pub enum TtsError {
    /// Engine is not available or not installed
    #[error("TTS engine not available: {0}")]
    EngineNotAvailable(String),

    /// Invalid text input
    #[error("Invalid text input: {0}")]
    InvalidInput(String),

    /// Starting or restarting an utterance failed
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Voice list query failed
    #[error("Voice listing failed: {0}")]
    VoiceListFailed(String),

    /// IO error (process spawning, pipes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for TTS operations
pub type TtsResult<T> = Result<T, TtsError>;
