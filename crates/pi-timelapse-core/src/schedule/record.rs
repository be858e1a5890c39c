use crate::capture::{sanitize_session_name, timestamped_session_name};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted capture window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Generated on arm.
    pub id: Uuid,
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end, always after `start`.
    pub end: DateTime<Utc>,
    /// Seconds between frames.
    pub interval_secs: u32,
    /// Frame rate for the auto-encode.
    pub frame_rate: u32,
    /// Enqueue an encode when the window ends.
    pub auto_encode: bool,
    /// Session to capture into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    /// When the schedule was armed.
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    /// `now` falls inside `[start, end)`.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }

    /// The window is over.
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }

    /// Session this window captures into.
    ///
    /// Derived from the window start when unnamed, so a window re-fired
    /// after a restart resumes the same session.
    pub fn session_name(&self) -> String {
        self.session_name
            .as_deref()
            .map(sanitize_session_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| timestamped_session_name(self.start.with_timezone(&Local)))
    }
}

/// Parameters of a new schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmRequest {
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
    /// Seconds between frames, at least 1.
    pub interval_secs: u32,
    /// Frame rate for the auto-encode.
    pub frame_rate: u32,
    /// Enqueue an encode when the window ends.
    pub auto_encode: bool,
    /// Session to capture into; derived from `start` when `None`.
    pub session_name: Option<String>,
}

/// On-disk form of the schedule store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ScheduleBook {
    #[serde(default, rename = "schedule")]
    pub schedules: Vec<Schedule>,
}
