use crate::{
    CoreError,
    capture::{CaptureStatus, SessionStore},
    encode::{EncodeWorker, JobFailure, JobState, JobStatus, JobTable, update_job},
    lease::{CameraLease, EncodeSlot},
    programs::{EncodeRequest, VideoEncoder},
    settings::EncodeSettings,
    storage::{StorageProbe, ensure_free_space},
};

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tokio::sync::{mpsc, watch};
use tracing::{info, instrument, warn};

/// A job on its way to the worker, carrying the in-flight claim.
pub(crate) struct QueuedJob {
    pub request: EncodeRequest,
    pub slot: EncodeSlot,
}

pub(crate) struct EncodeContext {
    pub lease: CameraLease,
    pub encoder: Arc<dyn VideoEncoder>,
    pub storage: Arc<dyn StorageProbe>,
    pub sessions: SessionStore,
    pub settings: EncodeSettings,
    pub min_free_bytes: u64,
    pub capture: watch::Receiver<CaptureStatus>,
}

struct QueueInner {
    tx: mpsc::Sender<QueuedJob>,
    jobs: JobTable,
    lease: CameraLease,
    storage: Arc<dyn StorageProbe>,
    sessions: SessionStore,
    settings: EncodeSettings,
    min_free_bytes: u64,
    capture: watch::Receiver<CaptureStatus>,
}

/// Front of the encode queue. Cheap to clone.
#[derive(Clone)]
pub struct EncodeQueue {
    inner: Arc<QueueInner>,
}

impl EncodeQueue {
    pub(crate) fn new(ctx: EncodeContext) -> (Self, EncodeWorker) {
        let (tx, rx) = mpsc::channel(ctx.settings.queue_depth.max(1));
        let jobs: JobTable = Arc::new(RwLock::new(HashMap::new()));

        let worker = EncodeWorker::new(rx, Arc::clone(&jobs), ctx.encoder, ctx.sessions.clone());
        let queue = Self {
            inner: Arc::new(QueueInner {
                tx,
                jobs,
                lease: ctx.lease,
                storage: ctx.storage,
                sessions: ctx.sessions,
                settings: ctx.settings,
                min_free_bytes: ctx.min_free_bytes,
                capture: ctx.capture,
            }),
        };

        (queue, worker)
    }

    /// Request a video of `session` at `frame_rate`.
    ///
    /// Never fails: rejections come back as a status with
    /// [`JobState::Error`] and a reason, and leave the job table untouched.
    /// An unsupported frame rate is replaced by the configured default.
    #[instrument(skip(self))]
    pub fn enqueue(&self, session: &str, frame_rate: u32) -> JobStatus {
        let inner = &self.inner;
        let resolved = inner.settings.resolve_frame_rate(frame_rate);
        if resolved != frame_rate {
            info!(requested = frame_rate, frame_rate = resolved, "Unsupported frame rate, using default");
        }
        let reject = |reason: JobFailure| {
            warn!(session, reason = %reason, "Encode request rejected");
            JobStatus::rejected(session, resolved, reason)
        };

        if inner.capture.borrow().active_session() == Some(session) {
            return reject(JobFailure::SessionActive);
        }

        let Some(slot) = inner.lease.try_begin_encode() else {
            return reject(JobFailure::Busy);
        };

        if let Err(e) = ensure_free_space(
            inner.storage.as_ref(),
            inner.sessions.root(),
            inner.min_free_bytes,
        ) {
            warn!(error = %e, "Encode pre-flight storage check failed");
            return reject(JobFailure::LowDisk);
        }

        let indices = match inner.sessions.frame_indices(session) {
            Ok(indices) => indices,
            Err(CoreError::SessionNotFound { .. }) => return reject(JobFailure::SessionNotFound),
            Err(e) => return reject(JobFailure::Io(e.to_string())),
        };
        let Some(first_index) = indices.first().copied() else {
            return reject(JobFailure::NoFrames);
        };

        let request = EncodeRequest {
            session: session.to_string(),
            frames_dir: inner.sessions.session_dir(session),
            first_index,
            total_frames: indices.len() as u64,
            frame_rate: resolved,
            output: inner.sessions.video_path(session),
        };

        let status = JobStatus::queued(session, resolved);
        inner
            .jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.to_string(), status.clone());

        if let Err(e) = inner.tx.try_send(QueuedJob { request, slot }) {
            // The slot travels inside the failed job and is released with it.
            warn!(error = %e, "Encode worker not accepting jobs");
            update_job(&inner.jobs, session, |s| {
                s.state = JobState::Error;
                s.reason = Some(JobFailure::WorkerUnavailable);
            });
            return JobStatus::rejected(session, resolved, JobFailure::WorkerUnavailable);
        }

        info!(session, frame_rate = resolved, frames = indices.len(), "Encode job queued");
        status
    }

    /// Latest job status for `session`.
    pub fn status(&self, session: &str) -> Option<JobStatus> {
        self.inner
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session)
            .cloned()
    }

    /// Every retained job, ordered by session name.
    pub fn jobs(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<JobStatus> = self
            .inner
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.session.cmp(&b.session));
        jobs
    }
}
