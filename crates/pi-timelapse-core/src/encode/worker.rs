use crate::{
    CoreError,
    capture::SessionStore,
    encode::{JobFailure, JobState, JobTable, queue::QueuedJob, update_job},
    programs::{VideoEncoder, progress_percent},
};

use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{error, info, instrument};

/// The single long-lived consumer of the encode queue.
pub(crate) struct EncodeWorker {
    rx: mpsc::Receiver<QueuedJob>,
    jobs: JobTable,
    encoder: Arc<dyn VideoEncoder>,
    sessions: SessionStore,
}

impl EncodeWorker {
    pub(crate) fn new(
        rx: mpsc::Receiver<QueuedJob>,
        jobs: JobTable,
        encoder: Arc<dyn VideoEncoder>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            rx,
            jobs,
            encoder,
            sessions,
        }
    }

    /// Drain jobs in FIFO order until shutdown is signalled.
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Encode worker started");

        loop {
            let job = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                job = self.rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.process(job).await;
        }

        info!("Encode worker stopped");
    }

    #[instrument(skip(self, job), fields(session = %job.request.session))]
    async fn process(&self, job: QueuedJob) {
        let QueuedJob { mut request, slot } = job;
        let session = request.session.clone();

        update_job(&self.jobs, &session, |s| {
            s.state = JobState::Encoding;
            s.progress = 0;
        });

        // Frames may have been added or deleted since enqueue.
        match self.sessions.frame_indices(&session) {
            Ok(indices) => match indices.first().copied() {
                Some(first) => {
                    request.first_index = first;
                    request.total_frames = indices.len() as u64;
                }
                None => {
                    self.fail(&session, JobFailure::NoFrames);
                    return;
                }
            },
            Err(CoreError::SessionNotFound { .. }) => {
                self.fail(&session, JobFailure::SessionNotFound);
                return;
            }
            Err(e) => {
                self.fail(&session, JobFailure::Io(e.to_string()));
                return;
            }
        }

        let encoder = Arc::clone(&self.encoder);
        let jobs = Arc::clone(&self.jobs);
        let total = request.total_frames;
        let progress_session = session.clone();

        // Own task so a panicking encoder still finalises the job.
        let mut encode = AbortOnDrop(tokio::spawn(async move {
            let on_progress = move |done: u64| {
                let pct = progress_percent(done, total);
                update_job(&jobs, &progress_session, |s| {
                    if s.state == JobState::Encoding && pct > s.progress {
                        s.progress = pct;
                    }
                });
            };
            encoder.encode(&request, &on_progress).await
        }));

        let outcome = match (&mut encode.0).await {
            Ok(result) => result,
            Err(e) => Err(CoreError::program("encoder", format!("encode task failed: {e}"))),
        };

        match outcome {
            Ok(()) => {
                update_job(&self.jobs, &session, |s| {
                    s.state = JobState::Done;
                    s.progress = 100;
                    s.reason = None;
                });
                info!(frames = total, "Encode job done");
            }
            Err(e) => {
                let detail = match &e {
                    CoreError::ExternalProgramFailure {
                        program, reason, ..
                    } => format!("{program}: {reason}"),
                    other => other.to_string(),
                };
                self.fail(&session, JobFailure::EncoderFailed(detail));
            }
        }

        drop(slot);
    }

    fn fail(&self, session: &str, reason: JobFailure) {
        error!(session, reason = %reason, "Encode job failed");
        update_job(&self.jobs, session, |s| {
            s.state = JobState::Error;
            s.progress = 0;
            s.reason = Some(reason);
        });
    }
}

/// Aborts the encode task, and with it the encoder process, if the worker
/// is cancelled while waiting on it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
