//! eSpeak TTS engine implementation for speaksel
//!
//! Drives an `espeak` (or `espeak-ng`) child process per utterance and
//! reports utterance lifecycle through the shared event channel. Unlike
//! a one-shot synthesis call, the child plays audio itself, so stopping
//! mid-utterance means killing the process; a watcher task per child
//! translates how the process died into the right lifecycle event.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use speaksel_tts::{
    EventSender, SpeechParams, TtsEngine, TtsError, TtsResult, UtteranceEvent, UtteranceUpdate,
    VoiceInfo,
};


/// Words-per-minute espeak speaks at when the rate multiplier is 1.0
const BASE_WPM: f32 = 175.0;

/// The utterance currently owned by a watcher task.
///
/// Dropping the sender (engine shutdown, slot replacement) also reaches the
/// watcher, so a child never outlives its engine.
struct ActiveUtterance {
    utterance_id: u64,
    kill_tx: oneshot::Sender<()>,
}

pub struct EspeakEngine {
    cmd: String,
    events: EventSender,
    /// Current child, if any. Sync mutex: never held across an await.
    active: Arc<Mutex<Option<ActiveUtterance>>>,
}

impl EspeakEngine {
    /// Probe for `espeak` then `espeak-ng` and build an engine around
    /// whichever is installed.
    pub async fn discover(events: EventSender) -> TtsResult<Self> {
        for cmd in ["espeak", "espeak-ng"] {
            if probe_command(cmd).await {
                debug!("using TTS command: {}", cmd);
                return Ok(Self::with_command(cmd, events));
            }
        }
        Err(TtsError::EngineNotAvailable(
            "espeak not found. Please install espeak or espeak-ng.".to_string(),
        ))
    }

    /// Build an engine around a specific command without probing.
    pub fn with_command(cmd: impl Into<String>, events: EventSender) -> Self {
        Self {
            cmd: cmd.into(),
            events,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Build espeak command arguments for one utterance
    fn build_args(&self, text: &str, params: &SpeechParams) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(voice) = &params.voice_name {
            args.push("-v".to_string());
            args.push(voice.clone());
        }

        // Rate multiplier -> words per minute, within espeak's -s range
        let wpm = (params.rate * BASE_WPM).round().clamp(80.0, 450.0) as u32;
        args.push("-s".to_string());
        args.push(wpm.to_string());

        let pitch_value = ((params.pitch * 50.0) as u32).min(99);
        args.push("-p".to_string());
        args.push(pitch_value.to_string());

        let volume_value = ((params.volume * 200.0) as u32).min(200);
        args.push("-a".to_string());
        args.push(volume_value.to_string());

        args.push(text.to_string());
        args
    }

    /// Kill the current child, if any. The watcher emits the
    /// `Interrupted` event once the process is gone.
    fn interrupt_active(&self) {
        if let Some(prev) = self.active.lock().take() {
            debug!("interrupting utterance {}", prev.utterance_id);
            let _ = prev.kill_tx.send(());
        }
    }

    /// Parse `espeak --voices` table output
    fn parse_voice_list(output: &str) -> Vec<VoiceInfo> {
        // Format: Pty Language Age/Gender VoiceName File Other
        // Example: 5  en             M  en                 (en 2)
        let voice_regex = Regex::new(r"^\s*(\d+)\s+([\w-]+)\s+([MF+]?)\s+([\w\-_]+)\s+").unwrap();

        let mut voices = Vec::new();
        for line in output.lines().skip(1) {
            if let Some(captures) = voice_regex.captures(line) {
                let lang = captures.get(2).map_or("unknown", |m| m.as_str()).to_string();
                let voice_name = captures.get(4).map_or("unknown", |m| m.as_str()).to_string();
                voices.push(VoiceInfo {
                    voice_name,
                    lang,
                    local_service: true,
                });
            }
        }
        voices
    }
}

#[async_trait]
impl TtsEngine for EspeakEngine {
    fn name(&self) -> &str {
        "eSpeak"
    }

    async fn is_available(&self) -> bool {
        probe_command(&self.cmd).await
    }

    async fn speak(&self, utterance_id: u64, text: &str, params: &SpeechParams) -> TtsResult<()> {
        if text.trim().is_empty() {
            return Err(TtsError::InvalidInput("Empty text input".to_string()));
        }

        let args = self.build_args(text, params);
        debug!("spawning {} for utterance {}: {:?}", self.cmd, utterance_id, args);

        // A new utterance always displaces the current one.
        self.interrupt_active();

        let child = Command::new(&self.cmd)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TtsError::SynthesisFailed(format!("failed to spawn {}: {}", self.cmd, e)))?;

        let (kill_tx, kill_rx) = oneshot::channel();
        *self.active.lock() = Some(ActiveUtterance {
            utterance_id,
            kill_tx,
        });

        // The spawn succeeded, so playback is about to begin.
        let _ = self
            .events
            .send(UtteranceUpdate::new(utterance_id, UtteranceEvent::Started));

        let events = self.events.clone();
        let active = self.active.clone();
        tokio::spawn(async move {
            let event = watch_child(child, kill_rx).await;

            // Clear the slot only if it still refers to this utterance;
            // a newer speak may already own it.
            {
                let mut slot = active.lock();
                if slot.as_ref().map(|a| a.utterance_id) == Some(utterance_id) {
                    *slot = None;
                }
            }

            debug!("utterance {} finished: {:?}", utterance_id, event);
            let _ = events.send(UtteranceUpdate::new(utterance_id, event));
        });

        Ok(())
    }

    async fn stop(&self) -> TtsResult<()> {
        self.interrupt_active();
        Ok(())
    }

    async fn list_voices(&self) -> TtsResult<Vec<VoiceInfo>> {
        let output = Command::new(&self.cmd)
            .arg("--voices")
            .output()
            .await
            .map_err(|e| TtsError::VoiceListFailed(format!("{}: {}", self.cmd, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TtsError::VoiceListFailed(format!(
                "{} --voices exited with {}: {}",
                self.cmd, output.status, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Self::parse_voice_list(&stdout))
    }
}

/// Check whether a TTS command responds to --version
async fn probe_command(cmd: &str) -> bool {
    Command::new(cmd)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Wait for a child to finish or be told to die, and classify the outcome.
async fn watch_child(mut child: Child, kill_rx: oneshot::Receiver<()>) -> UtteranceEvent {
    let stderr = child.stderr.take();

    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => UtteranceEvent::Ended,
            Ok(status) if status.code().is_none() => {
                // Killed by a signal we didn't send (or a racing stop).
                UtteranceEvent::Interrupted
            }
            Ok(status) => {
                let detail = read_stderr(stderr).await;
                UtteranceEvent::Error {
                    message: format!("espeak exited with {}: {}", status, detail),
                }
            }
            Err(e) => UtteranceEvent::Error {
                message: format!("failed to wait for espeak: {}", e),
            },
        },
        // Either an explicit kill request or the engine going away.
        _ = kill_rx => {
            if let Err(e) = child.start_kill() {
                warn!("failed to kill espeak child: {}", e);
            }
            let _ = child.wait().await;
            UtteranceEvent::Interrupted
        }
    }
}

/// Drain whatever espeak wrote to stderr, for error reporting
async fn read_stderr(stderr: Option<tokio::process::ChildStderr>) -> String {
    let Some(mut stderr) = stderr else {
        return "no error output".to_string();
    };
    let mut buf = String::new();
    match stderr.read_to_string(&mut buf).await {
        Ok(_) if !buf.trim().is_empty() => buf.trim().to_string(),
        _ => "no error output".to_string(),
    }
}
