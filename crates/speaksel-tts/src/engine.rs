//! TTS engine abstraction and utterance lifecycle events

use crate::error::TtsResult;
use crate::types::{SpeechParams, VoiceInfo};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Lifecycle events for a single utterance
///
/// An engine emits zero or more of these per `speak` call, asynchronously
/// and with no ordering guarantee relative to the call's own result. The
/// terminal variants (`Ended`, `Interrupted`, `Cancelled`, `Error`) mean
/// the utterance is over; `Started` is informational.
#[derive(Debug, Clone, PartialEq)]
pub enum UtteranceEvent {
    /// Audio playback began
    Started,
    /// The utterance finished playing to completion
    Ended,
    /// The utterance was cut off mid-playback (e.g. by `stop`)
    Interrupted,
    /// The utterance was dropped before playback started
    Cancelled,
    /// Synthesis or playback failed
    Error {
        /// Engine-reported failure description
        message: String,
    },
}

/// An [`UtteranceEvent`] tagged with the utterance it belongs to
///
/// The tag is the ID the caller passed to `speak`, so a receiver can
/// discard events from utterances it has already superseded instead of
/// applying them to whatever is current.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceUpdate {
    pub utterance_id: u64,
    pub event: UtteranceEvent,
}

impl UtteranceUpdate {
    pub fn new(utterance_id: u64, event: UtteranceEvent) -> Self {
        Self {
            utterance_id,
            event,
        }
    }
}

/// Channel on which engines deliver lifecycle events
pub type EventSender = mpsc::UnboundedSender<UtteranceUpdate>;

/// Core TTS engine interface
///
/// Implementations wrap a concrete synthesizer (espeak, a platform speech
/// service, a scripted test double). Engines are shared behind an `Arc`,
/// so all methods take `&self`; interior state is the implementation's
/// concern.
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Engine name/identifier
    fn name(&self) -> &str;

    /// Check whether the engine can synthesize on this system
    async fn is_available(&self) -> bool;

    /// Start speaking `text` with the given parameters.
    ///
    /// `Ok(())` means the utterance was accepted and queued — it is NOT
    /// confirmation that audio has started; that arrives later as an
    /// [`UtteranceEvent::Started`] tagged with `utterance_id`. Accepting a
    /// new utterance interrupts any current one.
    async fn speak(&self, utterance_id: u64, text: &str, params: &SpeechParams) -> TtsResult<()>;

    /// Stop any current utterance.
    ///
    /// Idempotent: calling with nothing playing is a no-op, and there is
    /// no acknowledgment distinguishing the two cases.
    async fn stop(&self) -> TtsResult<()>;

    /// List the voices this engine can speak with
    async fn list_voices(&self) -> TtsResult<Vec<VoiceInfo>>;
}
