//! What the evaluator should do at a given instant.
//!
//! Pure so the live tick and the boot reconcile share one decision: the
//! outcome depends only on the clock, the schedules and the capture state.

use crate::{capture::CaptureStatus, schedule::Schedule};

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlannedAction {
    /// Begin capturing for this window.
    Start(Schedule),
    /// The window of the running session is over.
    Stop { schedule: Schedule, session: String },
}

/// Decide the next action.
///
/// `system_idle` is the lease idle predicate; `fired` holds windows that
/// already produced a session in this process and must not start again.
pub(crate) fn plan(
    now: DateTime<Utc>,
    schedules: &[Schedule],
    capture: &CaptureStatus,
    system_idle: bool,
    fired: &HashSet<Uuid>,
) -> Option<PlannedAction> {
    if let CaptureStatus::Capturing(active) = capture {
        let schedule = active
            .schedule_id
            .and_then(|id| schedules.iter().find(|s| s.id == id))?;
        return schedule.is_past(now).then(|| PlannedAction::Stop {
            schedule: schedule.clone(),
            session: active.name.clone(),
        });
    }

    if !capture.is_idle() || !system_idle {
        return None;
    }

    schedules
        .iter()
        .filter(|s| s.contains(now) && !fired.contains(&s.id))
        .min_by_key(|s| s.start)
        .map(|s| PlannedAction::Start(s.clone()))
}
