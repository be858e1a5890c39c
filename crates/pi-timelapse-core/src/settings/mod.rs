//! Tunables for every core component.
//!
//! All structs deserialize with per-field defaults so a partial TOML
//! section loads cleanly; the daemon embeds them in its own config file.

mod capture_settings;
mod encode_settings;
mod live_view_settings;
mod scheduler_settings;
mod storage_settings;

pub use {
    capture_settings::CaptureSettings, encode_settings::EncodeSettings,
    live_view_settings::LiveViewSettings, scheduler_settings::SchedulerSettings,
    storage_settings::StorageSettings,
};

use crate::CoreResult;

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

pub(crate) const DEFAULT_INTERVAL_SECS: u32 = 10;
pub(crate) const DEFAULT_FRAME_RATE: u32 = 24;
pub(crate) const FRAME_RATE_CHOICES: [u32; 3] = [10, 24, 30];

/// Aggregate of all component settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Data directory layout and free-space thresholds.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Still-capture program and frame loop tuning.
    #[serde(default)]
    pub capture: CaptureSettings,
    /// Video encoder program and queue tuning.
    #[serde(default)]
    pub encode: EncodeSettings,
    /// Live-view streaming program and fan-out tuning.
    #[serde(default)]
    pub live_view: LiveViewSettings,
    /// Schedule evaluator tuning.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

impl Settings {
    /// Check cross-field constraints before anything is launched.
    pub fn validate(&self) -> CoreResult<()> {
        self.capture.validate()
    }
}

pub(crate) fn default_data_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("/home/pi/timelapse")
}

pub(crate) fn default_min_free_capture_bytes() -> u64 {
    200 * MIB
}

pub(crate) fn default_min_free_encode_bytes() -> u64 {
    500 * MIB
}

pub(crate) fn default_interval_secs() -> u32 {
    DEFAULT_INTERVAL_SECS
}

pub(crate) fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}

pub(crate) fn default_frame_rates() -> Vec<u32> {
    FRAME_RATE_CHOICES.to_vec()
}
