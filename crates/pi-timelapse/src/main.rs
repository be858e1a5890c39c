//! Pi-Timelapse: camera timelapse daemon for the Raspberry Pi.

mod app;
mod app_command;
mod config;
mod error;
mod job_monitor;
mod signal_handler;
#[cfg(test)]
mod tests;

pub(crate) use {
    app::App,
    app_command::AppCommand,
    error::{AppError, Result as AppResult},
    job_monitor::JobMonitor,
    signal_handler::SignalHandler,
};

use crate::config::{Config, DEFAULT_LOG_FILE_PREFIX, LoggingConfig};

use pi_timelapse_core::{Backends, Timelapse};
use tokio::sync::{mpsc, watch};
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point.
fn main() {
    let loaded = Config::load();
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();

    // Dropping the guard flushes and stops the file writer.
    let _log_guard = init_tracing(&logging);

    let config = match loaded {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run(config)) {
        error!(error = ?e, "Pi-Timelapse failed");
        std::process::exit(1);
    }
}

/// Stdout logging, plus JSON files rolled daily when a directory is configured.
///
/// `RUST_LOG` wins over the configured filter.
fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    match &logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, DEFAULT_LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

async fn run(config: Config) -> AppResult<()> {
    let timelapse = Timelapse::launch(config.core.clone(), Backends::system(&config.core))?;

    let (command_tx, command_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let signal_handler = SignalHandler::new(command_tx);
    let app = App {
        timelapse,
        command_rx,
        shutdown_tx,
    };

    let (signals, app) = tokio::join!(signal_handler.run(shutdown_rx), app.run());
    if let Err(e) = signals {
        error!(error = ?e, "Signal handler error");
    }

    app
}
