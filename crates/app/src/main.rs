use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use speaksel_app::protocol::{Request, Response, SessionResponse};
use speaksel_app::session::{ControllerConfig, SessionController};
use speaksel_app::shutdown::ShutdownHandler;
use speaksel_settings::JsonFileStore;
use speaksel_tts::TtsEngine;
use speaksel_tts_espeak::EspeakEngine;

#[derive(Debug, Parser)]
#[command(
    name = "speaksel",
    about = "Speak selected text aloud, with live rate adjustment"
)]
struct Cli {
    /// Settings file shared with the configuration frontends
    #[arg(long, env = "SPEAKSEL_SETTINGS", default_value = "speaksel-settings.json")]
    settings: PathBuf,

    /// Directory for rolling log files
    #[arg(long, env = "SPEAKSEL_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Milliseconds to let the engine settle between the stop and
    /// re-speak halves of a rate change
    #[arg(long, default_value_t = 50)]
    restart_delay_ms: u64,

    /// Print the available voices and exit
    #[arg(long)]
    list_voices: bool,
}

fn init_logging(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "speaksel.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    // Logs go to stderr: stdout carries protocol responses.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_dir)?;
    tracing::info!("Starting speaksel daemon");

    let store = JsonFileStore::new(&cli.settings);
    store
        .ensure_initialized()
        .await
        .context("initializing settings store")?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let engine = EspeakEngine::discover(event_tx)
        .await
        .context("locating a TTS engine")?;
    let engine: Arc<dyn TtsEngine> = Arc::new(engine);

    if cli.list_voices {
        for voice in engine.list_voices().await? {
            println!("{}\t{}", voice.voice_name, voice.lang);
        }
        return Ok(());
    }

    let config = ControllerConfig {
        restart_delay: Duration::from_millis(cli.restart_delay_ms),
        ..Default::default()
    };
    let (controller, handle) =
        SessionController::new(engine.clone(), Arc::new(store), event_rx, config);
    let controller_task = controller.spawn();
    tracing::info!("Session controller task started.");

    // Responses are written as they resolve, possibly out of request
    // order (a rate restart answers after its settle delay).
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Response>();
    let writer_task = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = out_rx.recv().await {
            match serde_json::to_string(&response) {
                Ok(line) => {
                    if stdout.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    if stdout.write_all(b"\n").await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(e) => tracing::error!("failed to encode response: {}", e),
            }
        }
    });

    let mut shutdown = ShutdownHandler::install();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stats_interval = tokio::time::interval(Duration::from_secs(60));

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = stats_interval.tick() => {
                tracing::debug!("session metrics: {:?}", handle.metrics());
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Request>(line) {
                            Ok(request) => {
                                let pending = handle.send(request).await;
                                let out_tx = out_tx.clone();
                                tokio::spawn(async move {
                                    if let Some(response) = pending.wait().await {
                                        let _ = out_tx.send(response);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::warn!("unparseable request: {}", e);
                                let _ = out_tx.send(
                                    SessionResponse::Error {
                                        message: format!("Invalid request: {}", e),
                                    }
                                    .into(),
                                );
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::info!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("stdin read error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    tracing::info!("Beginning graceful shutdown");
    let _ = engine.stop().await;
    drop(handle);
    drop(out_tx);
    let _ = controller_task.await;
    let _ = writer_task.await;
    tracing::info!("Shutdown complete");

    Ok(())
}
