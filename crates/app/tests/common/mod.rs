//! Shared fixtures for session controller tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use speaksel_app::protocol::{RateDirection, Request};
use speaksel_app::session::{ControllerConfig, ControllerHandle, SessionController};
use speaksel_settings::MemoryStore;
use speaksel_tts::{
    EventSender, SpeechParams, SpeechSettings, TtsEngine, TtsError, TtsResult, UtteranceEvent,
    UtteranceUpdate, VoiceInfo,
};

/// A call the controller made into the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Speak {
        utterance_id: u64,
        text: String,
        rate: f32,
    },
    Stop,
    ListVoices,
}

#[derive(Default)]
struct ScriptState {
    calls: Vec<EngineCall>,
    fail_speaks: bool,
    fail_voice_list: bool,
    voices: Vec<VoiceInfo>,
}

/// Scripted engine double: records every call and emits lifecycle events
/// only when the test says so, which makes the event/request interleaving
/// fully deterministic.
#[derive(Clone)]
pub struct ScriptedEngine {
    state: Arc<Mutex<ScriptState>>,
    events: EventSender,
}

impl ScriptedEngine {
    pub fn new(events: EventSender) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState::default())),
            events,
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn speak_calls(&self) -> Vec<(u64, String, f32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Speak {
                    utterance_id,
                    text,
                    rate,
                } => Some((utterance_id, text, rate)),
                _ => None,
            })
            .collect()
    }

    pub fn last_speak(&self) -> Option<(u64, String, f32)> {
        self.speak_calls().pop()
    }

    pub fn set_fail_speaks(&self, fail: bool) {
        self.state.lock().unwrap().fail_speaks = fail;
    }

    pub fn set_fail_voice_list(&self, fail: bool) {
        self.state.lock().unwrap().fail_voice_list = fail;
    }

    pub fn set_voices(&self, voices: Vec<VoiceInfo>) {
        self.state.lock().unwrap().voices = voices;
    }

    /// Emit a lifecycle event as the platform engine would
    pub fn emit(&self, utterance_id: u64, event: UtteranceEvent) {
        self.events
            .send(UtteranceUpdate::new(utterance_id, event))
            .unwrap();
    }
}

#[async_trait]
impl TtsEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn speak(&self, utterance_id: u64, text: &str, params: &SpeechParams) -> TtsResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::Speak {
            utterance_id,
            text: text.to_string(),
            rate: params.rate,
        });
        if state.fail_speaks {
            return Err(TtsError::SynthesisFailed("scripted failure".to_string()));
        }
        Ok(())
    }

    async fn stop(&self) -> TtsResult<()> {
        self.state.lock().unwrap().calls.push(EngineCall::Stop);
        Ok(())
    }

    async fn list_voices(&self) -> TtsResult<Vec<VoiceInfo>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::ListVoices);
        if state.fail_voice_list {
            return Err(TtsError::VoiceListFailed("scripted failure".to_string()));
        }
        Ok(state.voices.clone())
    }
}

/// A controller wired to a scripted engine and an in-memory store
pub struct TestRig {
    pub handle: ControllerHandle,
    pub engine: ScriptedEngine,
    pub store: Arc<MemoryStore>,
}

pub fn rig() -> TestRig {
    rig_with_settings(SpeechSettings::default())
}

pub fn rig_with_settings(settings: SpeechSettings) -> TestRig {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let engine = ScriptedEngine::new(event_tx);
    let store = Arc::new(MemoryStore::new(settings));
    let (controller, handle) = SessionController::new(
        Arc::new(engine.clone()),
        store.clone(),
        event_rx,
        ControllerConfig::default(),
    );
    controller.spawn();
    TestRig {
        handle,
        engine,
        store,
    }
}

pub fn speak(text: &str) -> Request {
    Request::Speak {
        text: text.to_string(),
    }
}

pub fn adjust(direction: RateDirection) -> Request {
    Request::AdjustRate { direction }
}

/// Let the controller drain everything runnable (paused-clock runtimes
/// only advance time once every task is idle, so returning from this
/// sleep means the controller has processed all queued messages).
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
}
