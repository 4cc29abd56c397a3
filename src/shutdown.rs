//! Graceful shutdown (§4.9, §5): on `SIGINT`/`SIGTERM`, stop accepting
//! new work, drain every Session's queue, then `QUIT` every
//! connection.

use std::sync::Arc;

use log::info;
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::watch,
};

use crate::registry::Registry;

/// Handle consulted by the ingest accept loops. Cloned freely: every
/// clone observes the same underlying flag.
#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been requested. Checks the current
    /// value before waiting, so a signal that already fired before this
    /// handle was cloned is never missed.
    pub async fn wait(&mut self) {
        while !*self.0.borrow() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Builds the sender half (held here, flipped on shutdown) and the
/// receiver half (cloned into every ingest accept loop).
pub fn channel() -> (watch::Sender<bool>, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (tx, ShutdownSignal(rx))
}

/// Waits for `SIGINT` or `SIGTERM`, flips `stop` so the ingest listeners
/// stop accepting new work (§5: "the daemon stops accepting new
/// requests"), then drains every Session's queue and quits.
pub async fn wait_and_drain(registry: Arc<Registry>, stop: watch::Sender<bool>) -> anyhow::Result<()> {
    let mut term = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = term.recv() => info!("received SIGTERM"),
    }

    info!("stopping ingest, draining sessions before shutdown");
    let _ = stop.send(true);
    registry.drain_and_quit("irker shutting down").await;
    info!("shutdown complete");

    Ok(())
}
