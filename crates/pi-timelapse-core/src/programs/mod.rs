//! Seams over the external camera and encoder programs.
//!
//! Each trait has one production implementation that shells out with
//! `tokio::process`; tests substitute in-process fakes.

mod still_camera;
mod video_encoder;
mod video_source;

pub use {
    still_camera::{RpicamStill, StillCamera},
    video_encoder::{EncodeRequest, FfmpegEncoder, VideoEncoder},
    video_source::{LiveProcess, RpicamVid, VideoSource},
};

pub(crate) use video_encoder::{parse_progress_line, progress_percent};

use std::path::Path;

/// Display name for a program path in logs and errors.
pub(crate) fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

/// Last non-empty line of a program's stderr, for error messages.
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}
