//! The session controller: serializes speak/stop/adjust/voices requests
//! against a single speech engine.
//!
//! The controller is a single task that owns the one [`SessionRecord`].
//! Everything reaches it as a message: frontend requests (each carrying a
//! one-shot responder), engine lifecycle events, and the delayed second
//! half of a rate change. Because the task handles one message at a time,
//! the record never needs a lock; races between flows are resolved by
//! generation tags checked after every suspension point instead.
//!
//! Rate changes use stop-and-restart: the engine cannot change the rate of
//! in-progress speech, so the controller stops it, waits a short settle
//! delay, re-checks that nothing overtook the change, and re-speaks the
//! same text with the new rate.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use speaksel_settings::SettingsStore;
use speaksel_tts::{
    clamp_rate, next_utterance_id, SpeechParams, TtsEngine, UtteranceEvent, UtteranceUpdate,
    RATE_STEP,
};

use crate::protocol::{RateDirection, Request, Response, SessionResponse, VoicesResponse};
use crate::session::record::{SessionRecord, SessionState};

/// Controller tuning
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Pause between the stop half and the speak half of a rate change,
    /// letting the engine settle. The restart re-check makes a wrong
    /// value harmless, just audible.
    pub restart_delay: Duration,
    /// Request queue depth before senders feel backpressure
    pub request_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            restart_delay: Duration::from_millis(50),
            request_capacity: 32,
        }
    }
}

/// Controller counters, snapshot-readable from the handle
#[derive(Debug, Clone, Default)]
pub struct SessionMetrics {
    pub speak_requests: u64,
    pub stop_requests: u64,
    pub rate_adjustments: u64,
    /// Rate restarts discarded because a stop or newer adjust overtook them
    pub restarts_discarded: u64,
    /// Engine events that arrived for an already-superseded utterance
    pub stale_events: u64,
    pub engine_errors: u64,
}

type Responder = oneshot::Sender<Response>;

struct Envelope {
    request: Request,
    responder: Responder,
}

/// The delayed second half of a rate change
struct RestartDue {
    generation: u64,
    expected_rate: f32,
    responder: Responder,
}

/// Client side of the controller's request channel
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Envelope>,
    metrics: Arc<RwLock<SessionMetrics>>,
}

impl ControllerHandle {
    /// Enqueue a request. The response arrives on the returned handle,
    /// possibly after later requests have already been answered.
    pub async fn send(&self, request: Request) -> PendingResponse {
        let (responder, rx) = oneshot::channel();
        if self
            .tx
            .send(Envelope { request, responder })
            .await
            .is_err()
        {
            warn!("session controller is gone; request dropped");
        }
        PendingResponse { rx }
    }

    /// Enqueue a request and wait for its response.
    ///
    /// `None` means no response will ever come: either the controller has
    /// shut down, or it deliberately dropped the responder (a rate
    /// restart superseded by a stop or a newer adjustment).
    pub async fn request(&self, request: Request) -> Option<Response> {
        self.send(request).await.wait().await
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics.read().clone()
    }
}

/// A response that may legitimately never arrive
pub struct PendingResponse {
    rx: oneshot::Receiver<Response>,
}

impl PendingResponse {
    pub async fn wait(self) -> Option<Response> {
        self.rx.await.ok()
    }
}

pub struct SessionController {
    engine: Arc<dyn TtsEngine>,
    settings: Arc<dyn SettingsStore>,
    config: ControllerConfig,
    requests: mpsc::Receiver<Envelope>,
    engine_events: mpsc::UnboundedReceiver<UtteranceUpdate>,
    restart_tx: mpsc::UnboundedSender<RestartDue>,
    restart_rx: mpsc::UnboundedReceiver<RestartDue>,
    /// The one session record; `None` is the quiescent Idle state
    session: Option<SessionRecord>,
    metrics: Arc<RwLock<SessionMetrics>>,
}

impl SessionController {
    pub fn new(
        engine: Arc<dyn TtsEngine>,
        settings: Arc<dyn SettingsStore>,
        engine_events: mpsc::UnboundedReceiver<UtteranceUpdate>,
        config: ControllerConfig,
    ) -> (Self, ControllerHandle) {
        let (tx, requests) = mpsc::channel(config.request_capacity);
        let (restart_tx, restart_rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(RwLock::new(SessionMetrics::default()));
        let handle = ControllerHandle {
            tx,
            metrics: metrics.clone(),
        };
        let controller = Self {
            engine,
            settings,
            config,
            requests,
            engine_events,
            restart_tx,
            restart_rx,
            session: None,
            metrics,
        };
        (controller, handle)
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until every request handle is dropped.
    pub async fn run(mut self) {
        info!("session controller started (engine: {})", self.engine.name());
        loop {
            tokio::select! {
                envelope = self.requests.recv() => {
                    let Some(Envelope { request, responder }) = envelope else {
                        break;
                    };
                    self.handle_request(request, responder).await;
                }
                Some(update) = self.engine_events.recv() => {
                    self.handle_engine_event(update);
                }
                Some(due) = self.restart_rx.recv() => {
                    self.handle_restart_due(due).await;
                }
            }
        }
        info!("session controller stopped");
    }

    async fn handle_request(&mut self, request: Request, responder: Responder) {
        match request {
            Request::Speak { text } => self.handle_speak(text, responder).await,
            Request::Stop => self.handle_stop(responder).await,
            Request::AdjustRate { direction } => {
                self.handle_adjust_rate(direction, responder).await
            }
            Request::GetVoices => self.handle_get_voices(responder).await,
        }
    }

    async fn handle_speak(&mut self, text: String, responder: Responder) {
        self.metrics.write().speak_requests += 1;

        if text.trim().is_empty() {
            respond(
                responder,
                SessionResponse::Error {
                    message: "No text provided".to_string(),
                }
                .into(),
            );
            return;
        }

        // Stop whatever is playing and forget it before the settings
        // read; a slow read must not leave a stale record behind.
        if let Err(e) = self.engine.stop().await {
            warn!("engine stop before speak failed: {}", e);
        }
        self.session = None;

        let settings = match self.settings.load().await {
            Ok(settings) => settings,
            Err(e) => {
                error!("failed to load settings for speak: {}", e);
                respond(
                    responder,
                    SessionResponse::Error {
                        message: "Failed to load settings".to_string(),
                    }
                    .into(),
                );
                return;
            }
        };

        let text = truncate_text(&text, settings.max_text_length);
        let params = SpeechParams::from_settings(&settings);
        let generation = next_utterance_id();

        debug!(
            generation,
            rate = params.rate,
            "speaking {} chars",
            text.chars().count()
        );

        // The record must be fully formed before the engine call so that
        // a rate adjustment landing next already sees it.
        self.session = Some(SessionRecord::new(generation, text.clone(), params.clone()));

        match self.engine.speak(generation, &text, &params).await {
            Ok(()) => {
                respond(
                    responder,
                    SessionResponse::Started {
                        initial_rate: params.rate,
                    }
                    .into(),
                );
            }
            Err(e) => {
                error!("engine rejected speak: {}", e);
                self.metrics.write().engine_errors += 1;
                self.clear_if_generation(generation);
                respond(
                    responder,
                    SessionResponse::Error {
                        message: format!("Failed to start speech: {}", e),
                    }
                    .into(),
                );
            }
        }
    }

    async fn handle_stop(&mut self, responder: Responder) {
        self.metrics.write().stop_requests += 1;
        if let Err(e) = self.engine.stop().await {
            warn!("engine stop failed: {}", e);
        }
        self.session = None;
        respond(responder, SessionResponse::Stopped.into());
    }

    async fn handle_adjust_rate(&mut self, direction: RateDirection, responder: Responder) {
        let Some(record) = self.session.as_mut() else {
            debug!("adjust rate: no active speech");
            respond(responder, SessionResponse::Inactive.into());
            return;
        };

        let current = record.params.rate;
        let step = match direction {
            RateDirection::Up => RATE_STEP,
            RateDirection::Down => -RATE_STEP,
        };
        let new_rate = clamp_rate(current + step);

        if new_rate == current {
            debug!("adjust rate: already at limit ({})", new_rate);
            respond(
                responder,
                SessionResponse::LimitReached { new_rate }.into(),
            );
            return;
        }

        info!("adjust rate: {} -> {}", current, new_rate);
        self.metrics.write().rate_adjustments += 1;

        // Mutate in place first: a rapid follow-up adjustment must step
        // from the new value even before this restart completes. The
        // fresh generation means the Interrupted event from the stop
        // below (tagged with the old one) cannot tear the record down
        // during the restart window.
        let generation = next_utterance_id();
        record.params.rate = new_rate;
        record.generation = generation;
        record.state = SessionState::Restarting;

        if let Err(e) = self.engine.stop().await {
            warn!("engine stop before restart failed: {}", e);
        }

        let restart_tx = self.restart_tx.clone();
        let delay = self.config.restart_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = restart_tx.send(RestartDue {
                generation,
                expected_rate: new_rate,
                responder,
            });
        });
    }

    async fn handle_restart_due(&mut self, due: RestartDue) {
        let RestartDue {
            generation,
            expected_rate,
            responder,
        } = due;

        // Snapshots, not references: the speak call below is a
        // suspension point and must not read shared state after it.
        let Some((text, params)) = self
            .session
            .as_ref()
            .filter(|s| s.generation == generation && s.params.rate == expected_rate)
            .map(|s| (s.text.clone(), s.params.clone()))
        else {
            // Stopped or re-adjusted during the delay. Whoever altered
            // the record owns the response; dropping this responder must
            // say nothing.
            debug!(generation, "restart superseded; discarding");
            self.metrics.write().restarts_discarded += 1;
            return;
        };

        match self.engine.speak(generation, &text, &params).await {
            Ok(()) => {
                if let Some(record) = self.session.as_mut() {
                    if record.generation == generation {
                        record.state = SessionState::Pending;
                    }
                }
                debug!(generation, "speech restarted at rate {}", expected_rate);
                respond(
                    responder,
                    SessionResponse::Adjusted {
                        new_rate: expected_rate,
                    }
                    .into(),
                );
            }
            Err(e) => {
                error!("restart after rate adjust failed: {}", e);
                self.metrics.write().engine_errors += 1;
                self.clear_if_generation(generation);
                respond(
                    responder,
                    SessionResponse::Error {
                        message: format!("Restart failed: {}", e),
                    }
                    .into(),
                );
            }
        }
    }

    async fn handle_get_voices(&mut self, responder: Responder) {
        match self.engine.list_voices().await {
            Ok(voices) => respond(responder, VoicesResponse::Voices { voices }.into()),
            Err(e) => {
                error!("get voices failed: {}", e);
                respond(
                    responder,
                    VoicesResponse::Error {
                        error: e.to_string(),
                    }
                    .into(),
                );
            }
        }
    }

    /// Apply an engine lifecycle event; this is the only place the engine
    /// side ends a session. No responses originate here.
    fn handle_engine_event(&mut self, update: UtteranceUpdate) {
        let UtteranceUpdate {
            utterance_id,
            event,
        } = update;

        if self.session.as_ref().map(|s| s.generation) != Some(utterance_id) {
            // An utterance this controller already replaced or cleared.
            debug!(utterance_id, "stale engine event: {:?}", event);
            self.metrics.write().stale_events += 1;
            return;
        }

        match event {
            UtteranceEvent::Started => {
                debug!(utterance_id, "utterance started");
                if let Some(record) = self.session.as_mut() {
                    if record.state == SessionState::Pending {
                        record.state = SessionState::Speaking;
                    }
                }
            }
            UtteranceEvent::Ended | UtteranceEvent::Interrupted | UtteranceEvent::Cancelled => {
                debug!(utterance_id, "utterance over: {:?}", event);
                self.session = None;
            }
            UtteranceEvent::Error { message } => {
                error!(utterance_id, "utterance error: {}", message);
                self.metrics.write().engine_errors += 1;
                self.session = None;
            }
        }
    }

    fn clear_if_generation(&mut self, generation: u64) {
        if self.session.as_ref().map(|s| s.generation) == Some(generation) {
            self.session = None;
        }
    }
}

/// Deliver a response if the requester is still listening.
///
/// The requester's channel may already be closed (frontend navigated away
/// or exited); that is never an error worth surfacing.
fn respond(responder: Responder, response: Response) {
    if responder.send(response).is_err() {
        debug!("requester gone; response dropped");
    }
}

/// Cut text to the configured maximum, marking the cut with an ellipsis.
/// A maximum of 0 means unlimited.
fn truncate_text(text: &str, max_len: usize) -> String {
    let trimmed = text.trim();
    if max_len == 0 || trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_len).collect();
    format!("{}...", cut.trim_end())
}
