use crate::{CoreError, CoreResult, settings::default_interval_secs};

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Still-capture program and frame loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Still-capture executable (e.g. `rpicam-still`).
    #[serde(default = "default_still_program")]
    pub still_program: PathBuf,
    /// Frame width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Frame height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
    /// JPEG quality passed to the still program.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Interval used when a start request does not specify one.
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u32,
    /// Upper bound on a single still-program invocation in the frame loop.
    /// Must be below `stop_join_timeout_secs`.
    #[serde(default = "default_capture_timeout_secs")]
    pub capture_timeout_secs: u64,
    /// Pause after a failed capture attempt before retrying.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    /// The loop gives up after `watchdog_factor` intervals without a frame.
    #[serde(default = "default_watchdog_factor")]
    pub watchdog_factor: u32,
    /// Lower bound on the watchdog window for very short intervals.
    #[serde(default = "default_watchdog_floor_secs")]
    pub watchdog_floor_secs: u64,
    /// How long `stop` waits for the frame loop to finish.
    #[serde(default = "default_stop_join_timeout_secs")]
    pub stop_join_timeout_secs: u64,
    /// Upper bound on a one-off still capture.
    #[serde(default = "default_still_timeout_secs")]
    pub still_timeout_secs: u64,
}

impl CaptureSettings {
    /// Reject combinations the frame loop cannot honour.
    pub fn validate(&self) -> CoreResult<()> {
        if self.capture_timeout_secs == 0 {
            return Err(CoreError::invalid("capture.capture_timeout_secs must be at least 1"));
        }
        if self.capture_timeout_secs >= self.stop_join_timeout_secs {
            return Err(CoreError::invalid(format!(
                "capture.capture_timeout_secs ({}) must be below capture.stop_join_timeout_secs ({})",
                self.capture_timeout_secs, self.stop_join_timeout_secs
            )));
        }
        Ok(())
    }

    /// Watchdog window for a given capture interval.
    pub fn watchdog_window(&self, interval: Duration) -> Duration {
        let scaled = interval.saturating_mul(self.watchdog_factor.max(1));
        scaled.max(Duration::from_secs(self.watchdog_floor_secs))
    }

    /// Retry backoff, never longer than the capture interval.
    pub fn retry_backoff(&self, interval: Duration) -> Duration {
        Duration::from_secs(self.retry_backoff_secs).min(interval)
    }

    pub(crate) fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    pub(crate) fn stop_join_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_join_timeout_secs)
    }

    pub(crate) fn still_timeout(&self) -> Duration {
        Duration::from_secs(self.still_timeout_secs)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            still_program: default_still_program(),
            width: default_width(),
            height: default_height(),
            quality: default_quality(),
            default_interval_secs: default_interval_secs(),
            capture_timeout_secs: default_capture_timeout_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            watchdog_factor: default_watchdog_factor(),
            watchdog_floor_secs: default_watchdog_floor_secs(),
            stop_join_timeout_secs: default_stop_join_timeout_secs(),
            still_timeout_secs: default_still_timeout_secs(),
        }
    }
}

fn default_still_program() -> PathBuf {
    PathBuf::from("rpicam-still")
}

fn default_width() -> u32 {
    1296
}

fn default_height() -> u32 {
    972
}

fn default_quality() -> u8 {
    90
}

fn default_capture_timeout_secs() -> u64 {
    6
}

fn default_retry_backoff_secs() -> u64 {
    2
}

fn default_watchdog_factor() -> u32 {
    3
}

fn default_watchdog_floor_secs() -> u64 {
    15
}

fn default_stop_join_timeout_secs() -> u64 {
    8
}

fn default_still_timeout_secs() -> u64 {
    10
}
