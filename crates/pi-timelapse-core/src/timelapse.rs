//! Wiring of every core component behind one handle.

use crate::{
    CoreResult,
    actions::{
        ActionSerializer, Intent, IntentOutcome, IntentSender, StartParams, StopParams,
        intent_channel,
    },
    capture::{
        CaptureContext, CaptureController, CaptureStatus, SessionInfo, SessionStore,
        StillCapture, StillImage,
    },
    encode::{EncodeContext, EncodeQueue, JobStatus},
    lease::CameraLease,
    live_view::{LiveStream, LiveViewStreamer},
    persist::RecordFile,
    programs::{FfmpegEncoder, RpicamStill, RpicamVid, StillCamera, VideoEncoder, VideoSource},
    schedule::{ArmRequest, Schedule, ScheduleStore, Scheduler},
    settings::Settings,
    storage::{StorageProbe, SystemStorage},
};

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, instrument, warn};
use uuid::Uuid;

const INTENT_QUEUE_DEPTH: usize = 32;
const CAPTURE_RECORD_FILE: &str = "capture.toml";
const SCHEDULE_FILE: &str = "schedules.toml";

/// The external programs and probes the core drives.
#[derive(Clone)]
pub struct Backends {
    /// Single-frame capture.
    pub still: Arc<dyn StillCamera>,
    /// Live-view MJPEG producer.
    pub video: Arc<dyn VideoSource>,
    /// Frame sequence to video.
    pub encoder: Arc<dyn VideoEncoder>,
    /// Free-space probe.
    pub storage: Arc<dyn StorageProbe>,
}

impl Backends {
    /// `rpicam-still`, `rpicam-vid`, `ffmpeg` and the OS disk list, as configured.
    pub fn system(settings: &Settings) -> Self {
        Self {
            still: Arc::new(RpicamStill::new(&settings.capture)),
            video: Arc::new(RpicamVid::new(&settings.live_view)),
            encoder: Arc::new(FfmpegEncoder::new(
                &settings.encode.program,
                settings.encode.niceness,
                &settings.capture,
            )),
            storage: Arc::new(SystemStorage),
        }
    }
}

/// Running core: the camera arbiter, its workers and the caller-facing operations.
///
/// Every operation returns a typed outcome; none of them panics or blocks
/// on the camera.
pub struct Timelapse {
    lease: CameraLease,
    capture: watch::Receiver<CaptureStatus>,
    intents: IntentSender,
    encode: EncodeQueue,
    live_view: LiveViewStreamer,
    still: StillCapture,
    scheduler: Arc<Scheduler>,
    sessions: SessionStore,
    shutdown: watch::Sender<bool>,
    workers: Vec<(&'static str, JoinHandle<()>)>,
    shutdown_timeout: Duration,
}

impl Timelapse {
    /// Create the data directories, restore schedules and start every worker.
    ///
    /// Must be called from inside a tokio runtime.
    #[instrument(skip_all, fields(data_dir = ?settings.storage.data_dir))]
    pub fn launch(settings: Settings, backends: Backends) -> CoreResult<Self> {
        settings.validate()?;

        let storage = &settings.storage;
        for dir in [storage.sessions_dir(), storage.stills_dir(), storage.state_dir()] {
            std::fs::create_dir_all(&dir)?;
        }

        let lease = CameraLease::new();
        let (status, capture) = watch::channel(CaptureStatus::Idle);
        let status = Arc::new(status);
        let (intents, intent_rx) = intent_channel(INTENT_QUEUE_DEPTH);
        let sessions = SessionStore::new(storage.sessions_dir());

        let live_view = LiveViewStreamer::new(
            lease.clone(),
            Arc::clone(&backends.video),
            settings.live_view.clone(),
        );

        let (encode, encode_worker) = EncodeQueue::new(EncodeContext {
            lease: lease.clone(),
            encoder: Arc::clone(&backends.encoder),
            storage: Arc::clone(&backends.storage),
            sessions: sessions.clone(),
            settings: settings.encode.clone(),
            min_free_bytes: storage.min_free_encode_bytes,
            capture: status.subscribe(),
        });

        let controller = CaptureController::new(CaptureContext {
            lease: lease.clone(),
            camera: Arc::clone(&backends.still),
            storage: Arc::clone(&backends.storage),
            sessions: sessions.clone(),
            live_view: live_view.clone(),
            settings: settings.capture.clone(),
            min_free_bytes: storage.min_free_capture_bytes,
            status: Arc::clone(&status),
            record: RecordFile::new(storage.state_dir().join(CAPTURE_RECORD_FILE)),
            intents: intents.clone(),
        });
        let serializer = ActionSerializer::new(controller, encode.clone(), lease.clone(), intent_rx);

        let scheduler = Arc::new(Scheduler::new(
            ScheduleStore::new(storage.state_dir().join(SCHEDULE_FILE)),
            intents.clone(),
            lease.clone(),
            status.subscribe(),
            settings.scheduler.clone(),
        ));

        let still = StillCapture::new(
            lease.clone(),
            Arc::clone(&backends.still),
            storage.stills_dir(),
            settings.capture.still_timeout(),
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let workers = vec![
            ("serializer", tokio::spawn(serializer.run(shutdown_rx.clone()))),
            ("encoder", tokio::spawn(encode_worker.run(shutdown_rx.clone()))),
            ("scheduler", {
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move { scheduler.run(shutdown_rx).await })
            }),
        ];

        info!("Timelapse core launched");

        Ok(Self {
            lease,
            capture,
            intents,
            encode,
            live_view,
            still,
            scheduler,
            sessions,
            shutdown,
            workers,
            // Room for the serializer's bounded stop join.
            shutdown_timeout: settings.capture.stop_join_timeout() + Duration::from_secs(2),
        })
    }

    /// Submit a start intent and wait for it to be drained.
    pub async fn start(&self, params: StartParams) -> CoreResult<IntentOutcome> {
        self.intents.submit(Intent::Start(params)).await
    }

    /// Stop whatever session is active.
    pub async fn stop(&self) -> CoreResult<IntentOutcome> {
        self.intents.submit(Intent::Stop(StopParams::manual())).await
    }

    /// Stop the active session and enqueue an encode of it.
    pub async fn stop_and_encode(&self, frame_rate: u32) -> CoreResult<IntentOutcome> {
        self.intents
            .submit(Intent::Stop(StopParams::manual().with_encode(frame_rate)))
            .await
    }

    /// Producer handle for callers that post intents themselves.
    pub fn intents(&self) -> IntentSender {
        self.intents.clone()
    }

    /// Current capture state.
    pub fn capture_status(&self) -> CaptureStatus {
        self.capture.borrow().clone()
    }

    /// Observe capture state changes.
    pub fn watch_capture(&self) -> watch::Receiver<CaptureStatus> {
        self.capture.clone()
    }

    /// No session capturing and no encode in flight.
    pub fn is_idle(&self) -> bool {
        self.lease.is_idle()
    }

    /// Request a video of `session`. Rejections come back in the status.
    pub fn enqueue(&self, session: &str, frame_rate: u32) -> JobStatus {
        self.encode.enqueue(session, frame_rate)
    }

    /// Latest encode status for `session`.
    pub fn status(&self, session: &str) -> Option<JobStatus> {
        self.encode.status(session)
    }

    /// Every retained encode status.
    pub fn jobs(&self) -> Vec<JobStatus> {
        self.encode.jobs()
    }

    /// Attach a live-view viewer. `Busy` unless idle.
    pub async fn open_stream(&self) -> CoreResult<LiveStream> {
        self.live_view.open_stream().await
    }

    /// Stop the live-view process.
    pub async fn kill_stream(&self) {
        self.live_view.kill().await
    }

    /// Take one still. `Busy` unless idle.
    pub async fn capture_one(&self) -> CoreResult<StillImage> {
        self.still.capture_one().await
    }

    /// Persist a capture window.
    pub async fn arm(&self, request: ArmRequest) -> CoreResult<Schedule> {
        self.scheduler.arm(request).await
    }

    /// Delete a capture window, stopping its session if it is running.
    pub async fn cancel(&self, id: Uuid) -> CoreResult<Schedule> {
        self.scheduler.cancel(id).await
    }

    /// All capture windows.
    pub async fn list(&self) -> Vec<Schedule> {
        self.scheduler.list().await
    }

    /// Drop ended capture windows.
    pub async fn cleanup(&self) -> CoreResult<usize> {
        self.scheduler.cleanup().await
    }

    /// Session catalogue, newest first.
    pub fn sessions(&self) -> CoreResult<Vec<SessionInfo>> {
        self.sessions.list()
    }

    /// Most recent frame of `session`.
    pub fn latest_frame(&self, session: &str) -> CoreResult<Option<PathBuf>> {
        self.sessions.latest_frame(session)
    }

    /// Rename a session that is not capturing. Returns the sanitised new name.
    pub fn rename_session(&self, from: &str, to: &str) -> CoreResult<String> {
        let active = self.capture_status();
        self.sessions.rename(from, to, active.active_session())
    }

    /// Delete a session that is not capturing.
    pub fn delete_session(&self, session: &str) -> CoreResult<()> {
        let active = self.capture_status();
        self.sessions.delete(session, active.active_session())
    }

    /// Stop every worker, ending any running session and live view.
    #[instrument(skip(self))]
    pub async fn shutdown(self) {
        info!("Timelapse core shutting down");

        // Receivers outlive this send; they are owned by the workers.
        let _ = self.shutdown.send(true);
        self.live_view.kill().await;

        for (name, mut handle) in self.workers {
            match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(worker = name, error = %e, "Worker ended abnormally"),
                Err(_) => {
                    warn!(worker = name, "Worker did not stop in time, aborting");
                    handle.abort();
                }
            }
        }

        info!("Timelapse core stopped");
    }
}
