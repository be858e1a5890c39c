//! The timed frame loop.
//!
//! Frames are written as `<dir>/<index>.jpg`. The index only advances on
//! an accepted frame, so failed attempts never leave a gap.

use crate::{
    actions::{Intent, IntentOrigin, IntentSender, StopParams},
    capture::{CaptureStatus, frame_file_name},
    programs::StillCamera,
    settings::CaptureSettings,
};

use std::{io::ErrorKind, path::Path, path::PathBuf, sync::Arc, time::Duration};

use tokio::{sync::watch, time::Instant};
use tracing::{debug, error, info, warn};

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum LoopExit {
    /// Stop was signalled.
    #[default]
    Stopped,
    /// No frame succeeded for a whole watchdog window.
    Watchdog,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FrameLoopReport {
    pub accepted: u64,
    pub failed_attempts: u64,
    pub last_index: Option<u64>,
    pub exit: LoopExit,
}

pub(crate) struct FrameLoop {
    pub camera: Arc<dyn StillCamera>,
    pub session: String,
    pub dir: PathBuf,
    pub interval: Duration,
    pub next_index: u64,
    pub settings: CaptureSettings,
    pub stop: watch::Receiver<bool>,
    pub status: Arc<watch::Sender<CaptureStatus>>,
    pub intents: IntentSender,
}

impl FrameLoop {
    pub(crate) async fn run(mut self) -> FrameLoopReport {
        let mut report = FrameLoopReport::default();
        let watchdog = self.settings.watchdog_window(self.interval);
        let backoff = self.settings.retry_backoff(self.interval);
        let timeout = self.settings.capture_timeout();
        let mut last_success = Instant::now();

        info!(
            session = %self.session,
            interval = ?self.interval,
            first_index = self.next_index,
            "Frame loop started"
        );

        loop {
            if *self.stop.borrow() {
                break;
            }

            let attempt_started = Instant::now();
            let index = self.next_index;
            let path = self.dir.join(frame_file_name(index));

            // Dropping the capture future kills the child; its output is never a frame.
            let attempt = tokio::select! {
                result = self.camera.capture(&path, timeout) => Some(result),
                _ = wait_for_stop(&mut self.stop) => None,
            };
            let Some(result) = attempt else {
                discard_partial(&path);
                debug!(session = %self.session, index, "Capture attempt abandoned for stop");
                break;
            };

            match result {
                Ok(()) => {
                    report.accepted += 1;
                    report.last_index = Some(index);
                    last_success = Instant::now();
                    self.next_index += 1;
                    self.publish_frame(index);
                    debug!(session = %self.session, index, "Frame accepted");

                    if self.pause_until(attempt_started + self.interval).await {
                        break;
                    }
                }
                Err(e) => {
                    report.failed_attempts += 1;
                    discard_partial(&path);
                    warn!(session = %self.session, index, error = %e, "Frame attempt failed");

                    if last_success.elapsed() >= watchdog {
                        error!(
                            session = %self.session,
                            window = ?watchdog,
                            "No frame accepted within watchdog window, ending session"
                        );
                        report.exit = LoopExit::Watchdog;
                        break;
                    }

                    if self.pause_until(Instant::now() + backoff).await {
                        break;
                    }
                }
            }
        }

        if report.exit == LoopExit::Watchdog {
            self.request_stop().await;
        }

        info!(
            session = %self.session,
            accepted = report.accepted,
            failed = report.failed_attempts,
            exit = ?report.exit,
            "Frame loop finished"
        );

        report
    }

    /// Sleep until `deadline`. Returns true as soon as stop is signalled.
    async fn pause_until(&mut self, deadline: Instant) -> bool {
        loop {
            if *self.stop.borrow() {
                return true;
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return *self.stop.borrow(),
                changed = self.stop.changed() => {
                    // Controller gone.
                    if changed.is_err() {
                        return true;
                    }
                }
            }
        }
    }

    /// Ask the serializer to end this session, waiting for queue room.
    /// Gives up once the controller is already stopping the loop.
    async fn request_stop(&mut self) {
        let stop = Intent::Stop(StopParams::for_session(
            self.session.clone(),
            IntentOrigin::Watchdog,
        ));

        tokio::select! {
            posted = self.intents.post(stop) => {
                if let Err(e) = posted {
                    warn!(session = %self.session, error = %e, "Watchdog stop not delivered");
                }
            }
            _ = wait_for_stop(&mut self.stop) => {
                debug!(session = %self.session, "Stop already under way, watchdog stop dropped");
            }
        }
    }

    fn publish_frame(&self, index: u64) {
        self.status.send_modify(|status| {
            if let CaptureStatus::Capturing(active) | CaptureStatus::Stopping(active) = status {
                active.frames_accepted += 1;
                active.last_index = Some(index);
            }
        });
    }
}

/// Resolves once stop is signalled or the controller is gone.
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    // Err means the sender was dropped, which also ends the session.
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Remove whatever a failed attempt left at the frame path.
fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = ?path, "Partial frame removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?path, error = %e, "Partial frame could not be removed"),
    }
}
