use crate::{CoreError, CoreResult, programs::program_name, settings::LiveViewSettings};

use std::{path::PathBuf, process::Stdio, time::Duration};

use tokio::{
    io::AsyncRead,
    process::{Child, Command},
};
use tracing::{info, warn};

/// Grace period for a killed stream process to exit.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// A running MJPEG producer: a byte stream plus whatever must be killed
/// to stop it.
pub struct LiveProcess {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    child: Option<Child>,
}

impl LiveProcess {
    /// Wrap a spawned child whose stdout carries the MJPEG stream.
    pub fn from_child(mut child: Child) -> CoreResult<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::program("live view", "stdout was not piped"))?;

        Ok(Self {
            reader: Box::new(stdout),
            child: Some(child),
        })
    }

    /// Wrap an in-process byte source with nothing to kill.
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            child: None,
        }
    }

    pub(crate) fn reader_mut(&mut self) -> &mut (dyn AsyncRead + Send + Unpin) {
        &mut *self.reader
    }

    /// Kill the producer and wait briefly for it to exit.
    pub(crate) async fn terminate(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };

        if let Err(e) = child.start_kill() {
            // Already exited.
            warn!(error = %e, "Live view process kill failed");
        }

        match tokio::time::timeout(KILL_GRACE, child.wait()).await {
            Ok(Ok(status)) => info!(%status, "Live view process exited"),
            Ok(Err(e)) => warn!(error = %e, "Live view process wait failed"),
            Err(_) => warn!("Live view process did not exit within grace period"),
        }
    }
}

/// Starts the camera-video streaming process.
pub trait VideoSource: Send + Sync {
    /// Spawn a producer. `fallback` asks for the reduced-resolution profile.
    fn spawn(&self, fallback: bool) -> CoreResult<LiveProcess>;
}

/// [`VideoSource`] driving `rpicam-vid` with MJPEG on stdout.
#[derive(Debug, Clone)]
pub struct RpicamVid {
    program: PathBuf,
    width: u32,
    height: u32,
    fallback_width: u32,
    fallback_height: u32,
    framerate: u32,
}

impl RpicamVid {
    /// Build from live-view settings.
    pub fn new(settings: &LiveViewSettings) -> Self {
        Self {
            program: settings.program.clone(),
            width: settings.width,
            height: settings.height,
            fallback_width: settings.fallback_width,
            fallback_height: settings.fallback_height,
            framerate: settings.framerate,
        }
    }
}

impl VideoSource for RpicamVid {
    fn spawn(&self, fallback: bool) -> CoreResult<LiveProcess> {
        let (width, height) = if fallback {
            (self.fallback_width, self.fallback_height)
        } else {
            (self.width, self.height)
        };
        let name = program_name(&self.program);

        let child = Command::new(&self.program)
            .args(["-t", "0", "--codec", "mjpeg", "--nopreview"])
            .args(["--width", &width.to_string()])
            .args(["--height", &height.to_string()])
            .args(["--framerate", &self.framerate.to_string()])
            .args(["-o", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CoreError::program(&name, format!("spawn failed: {e}")))?;

        info!(program = %name, width, height, fallback, "Live view process spawned");

        LiveProcess::from_child(child)
    }
}
