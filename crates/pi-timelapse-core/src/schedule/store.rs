use crate::{
    CoreResult,
    persist::RecordFile,
    schedule::{Schedule, ScheduleBook},
};

use std::path::PathBuf;

use tracing::warn;

/// Durable home of the schedule list. Only the scheduler writes it.
#[derive(Debug, Clone)]
pub(crate) struct ScheduleStore {
    file: RecordFile<ScheduleBook>,
}

impl ScheduleStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: RecordFile::new(path),
        }
    }

    /// All persisted schedules. An unreadable store counts as empty.
    pub(crate) fn load(&self) -> Vec<Schedule> {
        match self.file.load() {
            Ok(Some(book)) => book.schedules,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Schedule store unusable, starting with no schedules");
                Vec::new()
            }
        }
    }

    pub(crate) fn save(&self, schedules: &[Schedule]) -> CoreResult<()> {
        self.file.save(&ScheduleBook {
            schedules: schedules.to_vec(),
        })
    }
}
