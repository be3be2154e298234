//! Persisted speech settings for speaksel
//!
//! A small asynchronous key-value-style store for [`SpeechSettings`].
//! Semantics follow the extension-storage model the settings record came
//! from: no transactions, last write wins, eventual consistency across
//! readers is acceptable because the session controller re-reads settings
//! at the start of every speak attempt and never mid-utterance.

use async_trait::async_trait;
use speaksel_tts::SpeechSettings;
use thiserror::Error;

pub mod store;

pub use store::{JsonFileStore, MemoryStore};

/// Settings store error types
#[derive(Error, Debug)]
pub enum SettingsError {
    /// IO error reading or writing the backing file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but does not parse
    #[error("settings are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The store is unreachable (used by test doubles)
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous settings persistence
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the current settings record.
    ///
    /// A store with nothing persisted yet returns the defaults.
    async fn load(&self) -> Result<SpeechSettings, SettingsError>;

    /// Replace the persisted settings record.
    async fn store(&self, settings: &SpeechSettings) -> Result<(), SettingsError>;
}
