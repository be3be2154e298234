//! The session record: what is being spoken, and with what parameters

use speaksel_tts::SpeechParams;

/// Where the current utterance attempt is in its lifecycle.
///
/// Idle has no variant: it is represented by the record's absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Speak accepted by the engine; audio not yet confirmed
    Pending,
    /// The engine reported playback started
    Speaking,
    /// Stopped for a rate change; waiting for the delayed re-speak
    Restarting,
}

/// The single authoritative record of the current speech session.
///
/// Created optimistically when a speak request is issued, mutated in place
/// by rate adjustment, destroyed on stop and on every terminal engine
/// event. The generation tag changes whenever a new engine utterance is
/// (or is about to be) issued for this record, so late callbacks from a
/// superseded utterance can be recognized and discarded.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Engine utterance tag currently owned by this record
    pub generation: u64,
    /// Exact text being spoken; a rate change re-speaks this unchanged
    pub text: String,
    /// Engine parameters; `rate` is the only field mutated after creation
    pub params: SpeechParams,
    pub state: SessionState,
}

impl SessionRecord {
    pub fn new(generation: u64, text: String, params: SpeechParams) -> Self {
        Self {
            generation,
            text,
            params,
            state: SessionState::Pending,
        }
    }
}
