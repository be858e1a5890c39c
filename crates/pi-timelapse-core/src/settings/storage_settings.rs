use crate::settings::{
    default_data_dir, default_min_free_capture_bytes, default_min_free_encode_bytes,
};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where sessions, stills and persisted state live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Root directory; `sessions/`, `stills/` and `state/` are created under it.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Capture refuses to start below this many free bytes.
    #[serde(default = "default_min_free_capture_bytes")]
    pub min_free_capture_bytes: u64,

    /// Encode requests are refused below this many free bytes.
    #[serde(default = "default_min_free_encode_bytes")]
    pub min_free_encode_bytes: u64,
}

impl StorageSettings {
    /// Directory holding one sub-directory per session.
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    /// Directory for one-off stills.
    pub fn stills_dir(&self) -> PathBuf {
        self.data_dir.join("stills")
    }

    /// Directory for persisted records (schedules, active capture).
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            min_free_capture_bytes: default_min_free_capture_bytes(),
            min_free_encode_bytes: default_min_free_encode_bytes(),
        }
    }
}
