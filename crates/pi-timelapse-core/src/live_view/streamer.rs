//! Owner of the shared live-view process.
//!
//! One supervisor task per process: it reads the MJPEG byte stream,
//! splits it into frames and fans them out over a broadcast channel.
//! The supervisor holds the camera lease for as long as the process runs
//! and exits when killed, when the lease stops being idle, when no viewer
//! has been attached for the idle timeout, or when the process dies.

use crate::{
    BusyReason, CoreError, CoreResult,
    lease::{CameraLease, Consumer, LeaseGuard},
    live_view::{LiveStream, MjpegSplitter, StreamEvent},
    programs::{LiveProcess, VideoSource},
    settings::LiveViewSettings,
};

use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use tokio::{
    io::AsyncReadExt,
    sync::{Mutex, broadcast, oneshot},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, instrument, warn};

const READ_CHUNK: usize = 16 * 1024;
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;
const IDLE_CHECK: Duration = Duration::from_millis(500);
const SHUTDOWN_WAIT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Killed,
    LeaseLost,
    NoViewers,
    Exited,
    FallbackFailed,
}

struct RunningStream {
    kill_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

struct StreamerInner {
    lease: CameraLease,
    source: Arc<dyn VideoSource>,
    settings: LiveViewSettings,
    frames: broadcast::Sender<StreamEvent>,
    running: Mutex<Option<RunningStream>>,
    last_spawn: StdMutex<Option<Instant>>,
}

impl StreamerInner {
    /// Time left before another spawn is allowed.
    fn respawn_wait(&self) -> Duration {
        let last = *self.last_spawn.lock().unwrap_or_else(|e| e.into_inner());
        match last {
            Some(at) => self
                .settings
                .respawn_min_interval()
                .saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    fn mark_spawned(&self) {
        *self.last_spawn.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }
}

/// Serves one shared MJPEG stream to any number of viewers.
///
/// Cheap to clone; all clones share one process.
#[derive(Clone)]
pub struct LiveViewStreamer {
    inner: Arc<StreamerInner>,
}

impl LiveViewStreamer {
    /// Create a streamer with no process running.
    pub fn new(lease: CameraLease, source: Arc<dyn VideoSource>, settings: LiveViewSettings) -> Self {
        let (frames, _) = broadcast::channel(settings.frame_buffer.max(1));
        Self {
            inner: Arc::new(StreamerInner {
                lease,
                source,
                settings,
                frames,
                running: Mutex::new(None),
                last_spawn: StdMutex::new(None),
            }),
        }
    }

    /// Attach a viewer, spawning the streaming process if none is running.
    ///
    /// Fails with `Busy` unless the system is idle, or when a spawn would
    /// come sooner than the respawn rate limit allows.
    #[instrument(skip(self))]
    pub async fn open_stream(&self) -> CoreResult<LiveStream> {
        let mut running = self.inner.running.lock().await;

        let snapshot = self.inner.lease.snapshot();
        if !snapshot.is_idle() {
            return Err(CoreError::busy(
                snapshot.busy_reason().unwrap_or(BusyReason::Capturing),
            ));
        }

        if let Some(current) = running.as_ref() {
            if !current.task.is_finished() {
                debug!(viewers = self.inner.frames.receiver_count() + 1, "Viewer attached");
                return Ok(LiveStream::new(self.inner.frames.subscribe()));
            }
        }
        *running = None;

        if !self.inner.respawn_wait().is_zero() {
            return Err(CoreError::busy(BusyReason::Respawning));
        }

        let guard = self.inner.lease.acquire(Consumer::LiveView).ok_or_else(|| {
            let reason = self
                .inner
                .lease
                .snapshot()
                .busy_reason()
                .unwrap_or(BusyReason::CameraHeld(Consumer::LiveView));
            CoreError::busy(reason)
        })?;

        let process = self.inner.source.spawn(false)?;
        self.inner.mark_spawned();

        // Subscribe before the supervisor can publish anything.
        let viewer = LiveStream::new(self.inner.frames.subscribe());
        let (kill_tx, kill_rx) = oneshot::channel();
        let supervisor = Supervisor {
            inner: Arc::clone(&self.inner),
            kill: kill_rx,
            _lease: guard,
        };
        let task = tokio::spawn(supervisor.run(process));

        *running = Some(RunningStream {
            kill_tx: Some(kill_tx),
            task,
        });

        info!("Live view started");
        Ok(viewer)
    }

    /// Stop the streaming process (if any) and wait for it to release the camera.
    #[instrument(skip(self))]
    pub async fn kill(&self) {
        let running = self.inner.running.lock().await.take();
        let Some(mut running) = running else {
            return;
        };

        if let Some(kill) = running.kill_tx.take() {
            // Supervisor may already have exited on its own.
            let _ = kill.send(());
        }

        if tokio::time::timeout(SHUTDOWN_WAIT, &mut running.task)
            .await
            .is_err()
        {
            warn!(timeout = ?SHUTDOWN_WAIT, "Live view supervisor did not exit, aborting");
            running.task.abort();
        }
    }

    /// True while a streaming process is running.
    pub async fn is_running(&self) -> bool {
        self.inner
            .running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Number of attached viewers.
    pub fn viewer_count(&self) -> usize {
        self.inner.frames.receiver_count()
    }
}

struct Supervisor {
    inner: Arc<StreamerInner>,
    kill: oneshot::Receiver<()>,
    _lease: LeaseGuard,
}

impl Supervisor {
    async fn run(mut self, mut process: LiveProcess) {
        let settings = self.inner.settings.clone();
        let mut lease_rx = self.inner.lease.subscribe();
        let mut splitter = MjpegSplitter::new(MAX_FRAME_BYTES);
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut spawned_at = Instant::now();
        let mut fell_back = false;
        let mut idle_check = tokio::time::interval(IDLE_CHECK);
        let mut unwatched_since: Option<Instant> = None;

        let reason = loop {
            tokio::select! {
                _ = &mut self.kill => break EndReason::Killed,
                changed = lease_rx.changed() => {
                    if changed.is_err() || !lease_rx.borrow_and_update().is_idle() {
                        break EndReason::LeaseLost;
                    }
                }
                _ = idle_check.tick() => {
                    if self.inner.frames.receiver_count() == 0 {
                        let since = *unwatched_since.get_or_insert_with(Instant::now);
                        if since.elapsed() >= settings.viewer_idle_timeout() {
                            break EndReason::NoViewers;
                        }
                    } else {
                        unwatched_since = None;
                    }
                }
                read = process.reader_mut().read(&mut chunk) => match read {
                    Ok(n) if n > 0 => {
                        for frame in splitter.push(&chunk[..n]) {
                            // No receivers is fine; the idle check handles it.
                            let _ = self.inner.frames.send(StreamEvent::Frame(frame));
                        }
                    }
                    result => {
                        if let Err(e) = result {
                            warn!(error = %e, "Live view read failed");
                        }
                        if fell_back || spawned_at.elapsed() >= settings.early_exit_window() {
                            break EndReason::Exited;
                        }

                        warn!("Live view process exited early, retrying at fallback resolution");
                        fell_back = true;
                        process.terminate().await;
                        match self.respawn_fallback().await {
                            Ok(replacement) => {
                                process = replacement;
                                spawned_at = Instant::now();
                                splitter.reset();
                            }
                            Err(e) => {
                                warn!(error = %e, "Live view fallback spawn failed");
                                break EndReason::FallbackFailed;
                            }
                        }
                    }
                },
            }
        };

        process.terminate().await;
        let _ = self.inner.frames.send(StreamEvent::Ended);
        info!(reason = ?reason, "Live view stopped");
    }

    async fn respawn_fallback(&self) -> CoreResult<LiveProcess> {
        let wait = self.inner.respawn_wait();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        let process = self.inner.source.spawn(true)?;
        self.inner.mark_spawned();
        Ok(process)
    }
}
