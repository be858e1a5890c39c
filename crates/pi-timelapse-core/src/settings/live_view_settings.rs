use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Live-view streaming program and fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveViewSettings {
    /// Streaming executable producing MJPEG on stdout (e.g. `rpicam-vid`).
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Stream width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Stream height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
    /// Stream frame rate.
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Width used for the single fallback respawn.
    #[serde(default = "default_fallback_width")]
    pub fallback_width: u32,
    /// Height used for the single fallback respawn.
    #[serde(default = "default_fallback_height")]
    pub fallback_height: u32,
    /// Minimum gap between two process spawns.
    #[serde(default = "default_respawn_min_interval_ms")]
    pub respawn_min_interval_ms: u64,
    /// An exit within this window after spawn triggers the fallback respawn.
    #[serde(default = "default_early_exit_window_ms")]
    pub early_exit_window_ms: u64,
    /// Stop the shared process after this long without viewers.
    #[serde(default = "default_viewer_idle_timeout_secs")]
    pub viewer_idle_timeout_secs: u64,
    /// Frames buffered per viewer before slow viewers start skipping.
    #[serde(default = "default_frame_buffer")]
    pub frame_buffer: usize,
}

impl LiveViewSettings {
    pub(crate) fn respawn_min_interval(&self) -> Duration {
        Duration::from_millis(self.respawn_min_interval_ms)
    }

    pub(crate) fn early_exit_window(&self) -> Duration {
        Duration::from_millis(self.early_exit_window_ms)
    }

    pub(crate) fn viewer_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.viewer_idle_timeout_secs)
    }
}

impl Default for LiveViewSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            width: default_width(),
            height: default_height(),
            framerate: default_framerate(),
            fallback_width: default_fallback_width(),
            fallback_height: default_fallback_height(),
            respawn_min_interval_ms: default_respawn_min_interval_ms(),
            early_exit_window_ms: default_early_exit_window_ms(),
            viewer_idle_timeout_secs: default_viewer_idle_timeout_secs(),
            frame_buffer: default_frame_buffer(),
        }
    }
}

fn default_program() -> PathBuf {
    PathBuf::from("rpicam-vid")
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_framerate() -> u32 {
    15
}

fn default_fallback_width() -> u32 {
    320
}

fn default_fallback_height() -> u32 {
    240
}

fn default_respawn_min_interval_ms() -> u64 {
    1000
}

fn default_early_exit_window_ms() -> u64 {
    1000
}

fn default_viewer_idle_timeout_secs() -> u64 {
    30
}

fn default_frame_buffer() -> usize {
    8
}
