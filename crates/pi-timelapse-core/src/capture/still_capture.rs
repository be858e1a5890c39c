use crate::{
    BusyReason, CoreError, CoreResult,
    lease::{CameraLease, Consumer},
    programs::StillCamera,
};

use std::{path::PathBuf, sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::Local;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A one-off still, kept on disk and returned to the caller.
#[derive(Debug, Clone)]
pub struct StillImage {
    /// Where the still was written.
    pub path: PathBuf,
    /// JPEG bytes.
    pub bytes: Bytes,
}

/// One-shot camera acquisition under the lease.
#[derive(Clone)]
pub struct StillCapture {
    lease: CameraLease,
    camera: Arc<dyn StillCamera>,
    dir: PathBuf,
    timeout: Duration,
}

impl StillCapture {
    /// Stills are written to `dir`; each invocation is bounded by `timeout`.
    pub fn new(
        lease: CameraLease,
        camera: Arc<dyn StillCamera>,
        dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            lease,
            camera,
            dir: dir.into(),
            timeout,
        }
    }

    /// Take one frame. Fails with `Busy` instead of waiting for the camera.
    #[instrument(skip(self))]
    pub async fn capture_one(&self) -> CoreResult<StillImage> {
        let Some(_guard) = self.lease.acquire(Consumer::Still) else {
            let reason = self
                .lease
                .snapshot()
                .busy_reason()
                .unwrap_or(BusyReason::CameraHeld(Consumer::Still));
            return Err(CoreError::busy(reason));
        };

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(unique_still_name());

        if let Err(e) = self.camera.capture(&path, self.timeout).await {
            if path.exists() {
                if let Err(remove) = std::fs::remove_file(&path) {
                    warn!(path = ?path, error = %remove, "Partial still not removed");
                }
            }
            return Err(e);
        }

        let bytes = Bytes::from(std::fs::read(&path)?);
        info!(path = ?path, bytes = bytes.len(), "Still captured");

        Ok(StillImage { path, bytes })
    }
}

fn unique_still_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    let short = id.get(..8).unwrap_or(&id);
    format!("still-{}-{short}.jpg", Local::now().format("%Y%m%d-%H%M%S"))
}
