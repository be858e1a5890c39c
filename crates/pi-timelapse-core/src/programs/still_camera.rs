use crate::{
    CoreError, CoreResult,
    programs::{program_name, stderr_tail},
    settings::CaptureSettings,
};

use std::{panic::Location, path::Path, path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Produces a single JPEG frame on demand.
#[async_trait]
pub trait StillCamera: Send + Sync {
    /// Write one frame to `output`, giving up after `timeout`.
    ///
    /// Success means `output` exists and is non-empty.
    async fn capture(&self, output: &Path, timeout: Duration) -> CoreResult<()>;
}

/// [`StillCamera`] driving `rpicam-still` in fire-one-frame-now mode.
#[derive(Debug, Clone)]
pub struct RpicamStill {
    program: PathBuf,
    width: u32,
    height: u32,
    quality: u8,
}

impl RpicamStill {
    /// Build from capture settings.
    pub fn new(settings: &CaptureSettings) -> Self {
        Self {
            program: settings.still_program.clone(),
            width: settings.width,
            height: settings.height,
            quality: settings.quality,
        }
    }
}

#[async_trait]
impl StillCamera for RpicamStill {
    #[instrument(skip(self))]
    async fn capture(&self, output: &Path, timeout: Duration) -> CoreResult<()> {
        let name = program_name(&self.program);

        let child = Command::new(&self.program)
            .arg("-o")
            .arg(output)
            .args(["--width", &self.width.to_string()])
            .args(["--height", &self.height.to_string()])
            .args(["--quality", &self.quality.to_string()])
            .args(["--immediate", "--nopreview"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CoreError::program(&name, format!("spawn failed: {e}")))?;

        // On timeout the child is dropped and kill_on_drop reaps it.
        let finished = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| CoreError::Timeout {
                operation: format!("{name} frame"),
                after: timeout,
                location: ErrorLocation::from(Location::caller()),
            })?
            .map_err(|e| CoreError::program(&name, format!("wait failed: {e}")))?;

        if !finished.status.success() {
            return Err(CoreError::program(
                &name,
                format!("{}: {}", finished.status, stderr_tail(&finished.stderr)),
            ));
        }

        let written = tokio::fs::metadata(output)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(CoreError::program(&name, "exited 0 but wrote no frame"));
        }

        debug!(output = ?output, bytes = written, "Frame captured");

        Ok(())
    }
}
