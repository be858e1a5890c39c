//! Capture session lifecycle: Idle → Capturing → Stopping → Idle.
//!
//! Owned by the action serializer; nothing else calls `start` or `stop`.

use crate::{
    BusyReason, CoreError, CoreResult,
    actions::{Intent, IntentOrigin, IntentSender, StartParams, StopParams},
    capture::{
        ActiveCaptureRecord, ActiveSession, CaptureStatus, FrameLoop, FrameLoopReport, LoopExit,
        SessionStore, sanitize_session_name, timestamped_session_name,
    },
    lease::{CameraLease, Consumer, LeaseGuard},
    live_view::LiveViewStreamer,
    persist::RecordFile,
    programs::StillCamera,
    settings::CaptureSettings,
    storage::{StorageProbe, ensure_free_space},
};

use std::{sync::Arc, time::Duration};

use chrono::{Local, TimeDelta, Utc};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, instrument, warn};

/// Slack on top of the still timeout for a displaced still to drop its lease.
const DISPLACED_GRACE: Duration = Duration::from_secs(1);

/// Summary of a session that was just stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Session that ended.
    pub session: String,
    /// Frames accepted during this run.
    pub frames_accepted: u64,
    /// Capture attempts that failed and were retried.
    pub failed_attempts: u64,
    /// False if the frame loop had to be aborted after the join timeout.
    pub joined: bool,
}

/// Everything the controller needs from the rest of the core.
pub(crate) struct CaptureContext {
    pub lease: CameraLease,
    pub camera: Arc<dyn StillCamera>,
    pub storage: Arc<dyn StorageProbe>,
    pub sessions: SessionStore,
    pub live_view: LiveViewStreamer,
    pub settings: CaptureSettings,
    pub min_free_bytes: u64,
    pub status: Arc<watch::Sender<CaptureStatus>>,
    pub record: RecordFile<ActiveCaptureRecord>,
    pub intents: IntentSender,
}

struct RunningSession {
    name: String,
    stop_tx: watch::Sender<bool>,
    frame_loop: JoinHandle<FrameLoopReport>,
    timer: Option<JoinHandle<()>>,
    lease: LeaseGuard,
}

pub(crate) struct CaptureController {
    ctx: CaptureContext,
    running: Option<RunningSession>,
}

impl CaptureController {
    pub(crate) fn new(ctx: CaptureContext) -> Self {
        Self { ctx, running: None }
    }

    /// Name of the running session.
    pub(crate) fn active_session(&self) -> Option<&str> {
        self.running.as_ref().map(|r| r.name.as_str())
    }

    /// Begin a session. Refused unless the system is idle and storage is sufficient.
    #[instrument(skip(self), fields(origin = %params.origin))]
    pub(crate) async fn start(&mut self, params: &StartParams) -> CoreResult<ActiveSession> {
        if self.running.is_some() {
            return Err(CoreError::busy(BusyReason::Capturing));
        }

        let snapshot = self.ctx.lease.snapshot();
        if snapshot.capturing {
            return Err(CoreError::busy(BusyReason::Capturing));
        }
        if snapshot.encode_in_flight {
            return Err(CoreError::busy(BusyReason::Encoding));
        }

        let name = params
            .session_name
            .as_deref()
            .map(sanitize_session_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| timestamped_session_name(Local::now()));
        let interval_secs = match params.interval_secs {
            0 => self.ctx.settings.default_interval_secs.max(1),
            secs => secs,
        };

        ensure_free_space(
            self.ctx.storage.as_ref(),
            self.ctx.sessions.root(),
            self.ctx.min_free_bytes,
        )?;

        let dir = self.ctx.sessions.ensure(&name)?;
        let next_index = self.ctx.sessions.next_frame_index(&name)?;

        let lease = self
            .ctx
            .lease
            .acquire(Consumer::Capture)
            .ok_or_else(|| CoreError::busy(BusyReason::Capturing))?;

        // The device cannot be shared; the stream and any in-flight still
        // must be gone before the first frame.
        self.ctx.live_view.kill().await;
        let release_wait = self.ctx.settings.still_timeout() + DISPLACED_GRACE;
        if let Some(holder) = self.ctx.lease.wait_displaced(release_wait).await {
            warn!(session = %name, holder = %holder, "Camera not released in time, start refused");
            return Err(CoreError::busy(BusyReason::CameraHeld(holder)));
        }

        let started_at = Utc::now();
        let planned_end = params
            .duration
            .and_then(|d| TimeDelta::from_std(d).ok())
            .map(|d| started_at + d);
        let active = ActiveSession {
            name: name.clone(),
            interval_secs,
            started_at,
            planned_end,
            frames_accepted: 0,
            last_index: None,
            schedule_id: params.schedule_id,
        };
        self.ctx
            .status
            .send_replace(CaptureStatus::Capturing(active.clone()));

        let record = ActiveCaptureRecord {
            session: name.clone(),
            interval_secs,
            started_at,
            planned_end,
            schedule_id: params.schedule_id,
        };
        if let Err(e) = self.ctx.record.save(&record) {
            warn!(session = %name, error = %e, "Active capture record not saved");
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let frame_loop = FrameLoop {
            camera: Arc::clone(&self.ctx.camera),
            session: name.clone(),
            dir,
            interval: Duration::from_secs(u64::from(interval_secs)),
            next_index,
            settings: self.ctx.settings.clone(),
            stop: stop_rx,
            status: Arc::clone(&self.ctx.status),
            intents: self.ctx.intents.clone(),
        };
        let frame_loop = tokio::spawn(frame_loop.run());

        let timer = params
            .duration
            .map(|duration| self.spawn_duration_timer(name.clone(), duration));

        info!(
            session = %name,
            interval_secs,
            next_index,
            duration = ?params.duration,
            "Capture session started"
        );

        self.running = Some(RunningSession {
            name,
            stop_tx,
            frame_loop,
            timer,
            lease,
        });

        Ok(active)
    }

    /// End the running session. `None` when already idle.
    #[instrument(skip(self))]
    pub(crate) async fn stop(&mut self) -> Option<StopReport> {
        let running = self.running.take()?;

        self.ctx.status.send_modify(|status| {
            *status = match std::mem::take(status) {
                CaptureStatus::Capturing(active) => CaptureStatus::Stopping(active),
                other => other,
            };
        });

        // Receiver may already be gone if the loop exited on its own.
        let _ = running.stop_tx.send(true);
        if let Some(timer) = running.timer {
            timer.abort();
        }

        let join_timeout = self.ctx.settings.stop_join_timeout();
        let mut frame_loop = running.frame_loop;
        let (failed_attempts, joined) =
            match tokio::time::timeout(join_timeout, &mut frame_loop).await {
                Ok(Ok(report)) => {
                    if report.exit == LoopExit::Watchdog {
                        warn!(session = %running.name, "Session ended by the frame watchdog");
                    }
                    (report.failed_attempts, true)
                }
                Ok(Err(e)) => {
                    error!(session = %running.name, error = %e, "Frame loop task failed");
                    (0, false)
                }
                Err(_) => {
                    warn!(
                        session = %running.name,
                        timeout = ?join_timeout,
                        "Frame loop did not finish in time, aborting"
                    );
                    frame_loop.abort();
                    (0, false)
                }
            };

        let frames_accepted = match &*self.ctx.status.borrow() {
            CaptureStatus::Capturing(a) | CaptureStatus::Stopping(a) => a.frames_accepted,
            CaptureStatus::Idle => 0,
        };

        drop(running.lease);
        if let Err(e) = self.ctx.record.remove() {
            warn!(error = %e, "Active capture record not removed");
        }
        self.ctx.status.send_replace(CaptureStatus::Idle);

        info!(
            session = %running.name,
            frames_accepted,
            failed_attempts,
            joined,
            "Capture session stopped"
        );

        Some(StopReport {
            session: running.name,
            frames_accepted,
            failed_attempts,
            joined,
        })
    }

    /// Report and clear a capture record left behind by a previous process.
    pub(crate) fn recover_interrupted(&self) {
        match self.ctx.record.load() {
            Ok(Some(record)) => {
                warn!(
                    session = %record.session,
                    started_at = %record.started_at,
                    schedule_id = ?record.schedule_id,
                    "Capture session was interrupted by a restart"
                );
            }
            Ok(None) => return,
            Err(e) => warn!(error = %e, "Active capture record unreadable"),
        }

        if let Err(e) = self.ctx.record.remove() {
            warn!(error = %e, "Active capture record not removed");
        }
    }

    fn spawn_duration_timer(&self, session: String, duration: Duration) -> JoinHandle<()> {
        let intents = self.ctx.intents.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            info!(session = %session, "Session duration elapsed");
            if let Err(e) = intents
                .post(Intent::Stop(StopParams::for_session(
                    session,
                    IntentOrigin::Timer,
                )))
                .await
            {
                warn!(error = %e, "Duration stop not delivered");
            }
        })
    }
}
