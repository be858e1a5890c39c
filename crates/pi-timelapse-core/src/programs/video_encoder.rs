use crate::{CoreError, CoreResult, programs::program_name, settings::CaptureSettings};

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
};
use tracing::{debug, info, instrument};

/// Everything the encoder needs to turn one session into a video.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    /// Session being encoded.
    pub session: String,
    /// Directory holding the numbered frames.
    pub frames_dir: PathBuf,
    /// Lowest frame index present.
    pub first_index: u64,
    /// Number of frames, the progress denominator.
    pub total_frames: u64,
    /// Output frame rate.
    pub frame_rate: u32,
    /// Final video path.
    pub output: PathBuf,
}

/// Turns an ordered frame sequence into a single video.
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Encode `request`, calling `on_progress` with the number of frames
    /// written so far whenever the encoder reports it.
    async fn encode(
        &self,
        request: &EncodeRequest,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> CoreResult<()>;
}

/// [`VideoEncoder`] driving `ffmpeg` over the `%06d.jpg` frame sequence.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
    width: u32,
    height: u32,
    niceness: Option<i32>,
}

impl FfmpegEncoder {
    /// Build from the encoder program and the capture resolution.
    pub fn new(program: &Path, niceness: Option<i32>, capture: &CaptureSettings) -> Self {
        Self {
            program: program.to_path_buf(),
            width: capture.width,
            height: capture.height,
            niceness,
        }
    }

    /// Base command, wrapped in `nice` where the platform has it.
    fn command(&self) -> Command {
        match self.niceness {
            Some(n) if cfg!(unix) => {
                let mut cmd = Command::new("nice");
                cmd.arg("-n").arg(n.to_string()).arg(&self.program);
                cmd
            }
            _ => Command::new(&self.program),
        }
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    #[instrument(skip(self, on_progress), fields(session = %request.session))]
    async fn encode(
        &self,
        request: &EncodeRequest,
        on_progress: &(dyn Fn(u64) + Send + Sync),
    ) -> CoreResult<()> {
        let name = program_name(&self.program);
        let pattern = request.frames_dir.join(crate::capture::FRAME_PATTERN);
        // ffmpeg picks the container from the extension, so keep .mp4 last.
        let partial = request.output.with_extension("partial.mp4");

        let mut child = self
            .command()
            .args(["-y", "-hide_banner", "-nostats", "-progress", "pipe:1"])
            .args(["-framerate", &request.frame_rate.to_string()])
            .args(["-start_number", &request.first_index.to_string()])
            .arg("-i")
            .arg(&pattern)
            .args(["-vf", &format!("scale={}:{}", self.width, self.height)])
            .args(["-pix_fmt", "yuv420p"])
            .arg(&partial)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CoreError::program(&name, format!("spawn failed: {e}")))?;

        info!(
            frames = request.total_frames,
            frame_rate = request.frame_rate,
            output = ?request.output,
            "Encoder started"
        );

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(frame) = parse_progress_line(&line) {
                    on_progress(frame);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| CoreError::program(&name, format!("wait failed: {e}")))?;

        if !status.success() {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(CoreError::program(&name, format!("{status}")));
        }

        tokio::fs::rename(&partial, &request.output).await?;
        debug!(output = ?request.output, "Encoder output finalized");

        Ok(())
    }
}

/// Extract the frame counter from an encoder progress line
/// (`frame=123` from `-progress`, or `frame=  123 fps=...` stats lines).
pub(crate) fn parse_progress_line(line: &str) -> Option<u64> {
    let rest = line.trim_start().strip_prefix("frame=")?;
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Integer progress in `0..=99`; only a finished job reports 100.
pub(crate) fn progress_percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = done.saturating_mul(100) / total;
    pct.min(99) as u8
}
