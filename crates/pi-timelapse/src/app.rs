use crate::{AppCommand, AppResult, JobMonitor};

use std::time::Duration;

use pi_timelapse_core::{CaptureStatus, JobState, Timelapse};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

const JOB_POLL: Duration = Duration::from_secs(2);

/// Main application state.
///
/// Owns the running core and reports its state changes until a shutdown
/// command arrives.
pub struct App {
    pub(crate) timelapse: Timelapse,
    pub(crate) command_rx: mpsc::Receiver<AppCommand>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
}

impl App {
    /// Run the main application event loop.
    #[instrument(skip(self))]
    pub(crate) async fn run(mut self) -> AppResult<()> {
        info!("Pi-Timelapse starting");

        match self.timelapse.sessions() {
            Ok(sessions) => info!(sessions = sessions.len(), "Session catalogue loaded"),
            Err(e) => warn!(error = %e, "Session catalogue unreadable"),
        }
        let schedules = self.timelapse.list().await;
        info!(schedules = schedules.len(), "Capture windows armed");

        let mut capture = self.timelapse.watch_capture();
        let mut jobs = JobMonitor::default();
        let mut job_poll = tokio::time::interval(JOB_POLL);

        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        AppCommand::Shutdown { signal } => {
                            info!(signal, "Shutdown requested");
                            break;
                        }
                    }
                }

                changed = capture.changed() => {
                    if changed.is_err() {
                        warn!("Capture status channel closed, shutting down");
                        break;
                    }
                    let status = capture.borrow_and_update().clone();
                    log_capture(&status);
                }

                _ = job_poll.tick() => {
                    for job in jobs.observe(self.timelapse.jobs()) {
                        match job.state {
                            JobState::Error => error!(
                                session = %job.session,
                                reason = ?job.reason.as_ref().map(ToString::to_string),
                                "Encode job failed"
                            ),
                            state => info!(
                                session = %job.session,
                                frame_rate = job.frame_rate,
                                progress = job.progress,
                                %state,
                                "Encode job updated"
                            ),
                        }
                    }
                }
            }
        }

        let _ = self.shutdown_tx.send(true);
        self.timelapse.shutdown().await;
        info!("Pi-Timelapse shut down successfully");

        Ok(())
    }
}

fn log_capture(status: &CaptureStatus) {
    match status {
        CaptureStatus::Idle => info!("Camera idle"),
        CaptureStatus::Capturing(active) if active.frames_accepted == 0 => info!(
            session = %active.name,
            interval_secs = active.interval_secs,
            schedule_id = ?active.schedule_id,
            "Capturing"
        ),
        CaptureStatus::Capturing(active) => debug!(
            session = %active.name,
            frames = active.frames_accepted,
            last_index = ?active.last_index,
            "Frame stored"
        ),
        CaptureStatus::Stopping(active) => info!(
            session = %active.name,
            frames = active.frames_accepted,
            "Stopping capture"
        ),
    }
}
