//! Pi Timelapse Core Library
//!
//! Camera arbitration and job orchestration for a single-camera timelapse
//! rig: a timed frame loop, a shared live preview, one-off stills, a
//! single-worker encode queue and persisted capture windows, with at most
//! one consumer on the camera at any time.
//!
//! # Example
//!
//! ```no_run
//! use pi_timelapse_core::{Backends, CoreResult, Settings, StartParams, Timelapse};
//!
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> CoreResult<()> {
//!     let settings = Settings::default();
//!     let timelapse = Timelapse::launch(settings.clone(), Backends::system(&settings))?;
//!
//!     timelapse.start(StartParams::manual(Some("garden".into()), 5)).await?;
//!     tokio::time::sleep(Duration::from_secs(60)).await;
//!     timelapse.stop_and_encode(24).await?;
//!
//!     timelapse.shutdown().await;
//!     Ok(())
//! }
//! ```

mod actions;
mod capture;
mod encode;
mod error;
mod lease;
mod live_view;
mod persist;
mod programs;
mod schedule;
mod settings;
mod storage;
mod timelapse;

pub use {
    actions::{
        DiscardReason, Intent, IntentOrigin, IntentOutcome, IntentSender, StartParams, StopParams,
    },
    capture::{
        ActiveSession, CaptureStatus, FRAME_PATTERN, SessionInfo, SessionStore, StillCapture,
        StillImage, StopReport, VIDEO_FILE, frame_file_name, parse_frame_index,
        sanitize_session_name, timestamped_session_name,
    },
    encode::{EncodeQueue, JobFailure, JobState, JobStatus},
    error::{BusyReason, CoreError, Result as CoreResult},
    lease::{CameraLease, Consumer, EncodeSlot, LeaseGuard, LeaseSnapshot},
    live_view::{LiveStream, LiveViewStreamer, MjpegSplitter, StreamEvent},
    programs::{
        EncodeRequest, FfmpegEncoder, LiveProcess, RpicamStill, RpicamVid, StillCamera,
        VideoEncoder, VideoSource,
    },
    schedule::{ArmRequest, Schedule},
    settings::{
        CaptureSettings, EncodeSettings, LiveViewSettings, SchedulerSettings, Settings,
        StorageSettings,
    },
    storage::{StorageProbe, SystemStorage},
    timelapse::{Backends, Timelapse},
};

#[cfg(test)]
mod tests;
