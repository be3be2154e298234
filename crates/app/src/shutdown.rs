//! Ctrl-C shutdown plumbing for the daemon

use tokio::sync::watch;
use tracing::info;

/// Waits for the first interrupt signal.
pub struct ShutdownHandler {
    rx: watch::Receiver<bool>,
}

impl ShutdownHandler {
    /// Install the signal listener and return a handle to wait on.
    pub fn install() -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
                let _ = tx.send(true);
            }
        });
        Self { rx }
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                break;
            }
        }
    }
}
