use crate::settings::{default_frame_rate, default_frame_rates};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Video encoder program and queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeSettings {
    /// Encoder executable (e.g. `ffmpeg`).
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Frame rates offered to callers; anything else falls back to the default.
    #[serde(default = "default_frame_rates")]
    pub frame_rates: Vec<u32>,
    /// Frame rate used for unsupported requests.
    #[serde(default = "default_frame_rate")]
    pub default_frame_rate: u32,
    /// `nice` increment applied to the encoder on unix. `None` runs it at normal priority.
    #[serde(default = "default_niceness")]
    pub niceness: Option<i32>,
    /// Capacity of the job channel between enqueue and the worker.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl EncodeSettings {
    /// Clamp a requested frame rate to the supported set.
    pub fn resolve_frame_rate(&self, requested: u32) -> u32 {
        if self.frame_rates.contains(&requested) {
            requested
        } else {
            self.default_frame_rate
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            frame_rates: default_frame_rates(),
            default_frame_rate: default_frame_rate(),
            niceness: default_niceness(),
            queue_depth: default_queue_depth(),
        }
    }
}

fn default_program() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_niceness() -> Option<i32> {
    Some(10)
}

fn default_queue_depth() -> usize {
    4
}
