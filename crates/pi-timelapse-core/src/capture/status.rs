use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The running capture session, as published to status readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// Session name (and directory name).
    pub name: String,
    /// Seconds between frames.
    pub interval_secs: u32,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the duration timer will stop it, if one is armed.
    pub planned_end: Option<DateTime<Utc>>,
    /// Frames accepted so far in this run.
    pub frames_accepted: u64,
    /// Index of the most recent accepted frame.
    pub last_index: Option<u64>,
    /// Schedule that started the session, if any.
    pub schedule_id: Option<Uuid>,
}

/// Capture controller state machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    /// No session.
    #[default]
    Idle,
    /// Frame loop running.
    Capturing(ActiveSession),
    /// Stop signalled, waiting for the frame loop to finish.
    Stopping(ActiveSession),
}

impl CaptureStatus {
    /// Name of the session holding the camera, while capturing or stopping.
    pub fn active_session(&self) -> Option<&str> {
        match self {
            CaptureStatus::Idle => None,
            CaptureStatus::Capturing(s) | CaptureStatus::Stopping(s) => Some(&s.name),
        }
    }

    /// True only in [`CaptureStatus::Capturing`].
    pub fn is_capturing(&self) -> bool {
        matches!(self, CaptureStatus::Capturing(_))
    }

    /// True in [`CaptureStatus::Idle`].
    pub fn is_idle(&self) -> bool {
        matches!(self, CaptureStatus::Idle)
    }
}
