mod controller;
mod frame_loop;
mod record;
mod session;
mod status;
mod still_capture;

pub(crate) use {
    controller::{CaptureContext, CaptureController},
    frame_loop::{FrameLoop, FrameLoopReport, LoopExit},
    record::ActiveCaptureRecord,
};

pub use {
    controller::StopReport,
    session::{
        FRAME_PATTERN, SessionInfo, SessionStore, VIDEO_FILE, frame_file_name, parse_frame_index,
        sanitize_session_name, timestamped_session_name,
    },
    status::{ActiveSession, CaptureStatus},
    still_capture::{StillCapture, StillImage},
};
