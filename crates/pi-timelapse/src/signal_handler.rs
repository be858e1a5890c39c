//! OS signal forwarding.
//!
//! Turns Ctrl-C and (on unix) SIGTERM into [`AppCommand::Shutdown`] on the
//! application's command channel.

use crate::{AppCommand, AppError, AppResult};

use std::panic::Location;

use error_location::ErrorLocation;
use tokio::sync::{mpsc, watch};
use tracing::{info, instrument, warn};

/// Listens for termination signals until shutdown.
pub struct SignalHandler {
    command_tx: mpsc::Sender<AppCommand>,
}

impl SignalHandler {
    /// Forward signals as commands on `command_tx`.
    pub fn new(command_tx: mpsc::Sender<AppCommand>) -> Self {
        Self { command_tx }
    }

    /// Wait for the first signal, forward it, and return.
    ///
    /// Also returns when `shutdown_rx` fires first.
    #[instrument(skip_all)]
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> AppResult<()> {
        let signal = tokio::select! {
            _ = shutdown_rx.changed() => return Ok(()),
            signal = wait_for_signal() => signal?,
        };

        info!(signal, "Termination signal received");
        self.forward(signal).await;
        Ok(())
    }

    /// Send a shutdown command for `signal`. Returns whether it was delivered.
    pub(crate) async fn forward(&self, signal: &'static str) -> bool {
        match self.command_tx.send(AppCommand::Shutdown { signal }).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "App loop gone, shutdown command dropped");
                false
            }
        }
    }
}

#[track_caller]
fn runtime_error(what: &str, e: std::io::Error) -> AppError {
    AppError::RuntimeError {
        reason: format!("Failed to listen for {what}: {e}"),
        location: ErrorLocation::from(Location::caller()),
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> AppResult<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| runtime_error("SIGTERM", e))?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| runtime_error("Ctrl-C", e))?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> AppResult<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| runtime_error("Ctrl-C", e))?;
    Ok("Ctrl-C")
}
