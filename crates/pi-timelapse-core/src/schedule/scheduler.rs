//! The schedule evaluator.
//!
//! One periodic task compares the wall clock against the armed windows
//! and pushes start/stop intents to the action serializer. The first tick
//! runs immediately on launch, which is also the boot reconcile: a window
//! found in progress after a restart fires exactly as it would have live.

use crate::{
    CoreError, CoreResult,
    actions::{Intent, IntentOrigin, IntentOutcome, IntentSender, StartParams, StopParams},
    capture::{CaptureStatus, sanitize_session_name},
    lease::CameraLease,
    schedule::{ArmRequest, PlannedAction, Schedule, ScheduleStore, plan},
    settings::SchedulerSettings,
};

use std::collections::HashSet;

use chrono::Utc;
use tokio::{
    sync::{Mutex, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

struct SchedulerState {
    schedules: Vec<Schedule>,
    /// Windows that produced a session in this process.
    fired: HashSet<Uuid>,
}

/// Owner of all schedule records.
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    store: ScheduleStore,
    intents: IntentSender,
    lease: CameraLease,
    capture: watch::Receiver<CaptureStatus>,
    settings: SchedulerSettings,
}

impl Scheduler {
    /// Load persisted schedules, dropping windows that ended while the
    /// process was down.
    pub(crate) fn new(
        store: ScheduleStore,
        intents: IntentSender,
        lease: CameraLease,
        capture: watch::Receiver<CaptureStatus>,
        settings: SchedulerSettings,
    ) -> Self {
        let now = Utc::now();
        let loaded = store.load();
        let total = loaded.len();
        let (past, schedules): (Vec<Schedule>, Vec<Schedule>) =
            loaded.into_iter().partition(|s| s.is_past(now));

        for schedule in &past {
            info!(id = %schedule.id, end = %schedule.end, "Discarding schedule that ended while down");
        }
        if !past.is_empty() {
            if let Err(e) = store.save(&schedules) {
                warn!(error = %e, "Schedule store not rewritten after discarding past windows");
            }
        }
        info!(loaded = total, kept = schedules.len(), "Schedules restored");

        Self {
            state: Mutex::new(SchedulerState {
                schedules,
                fired: HashSet::new(),
            }),
            store,
            intents,
            lease,
            capture,
            settings,
        }
    }

    /// Persist a new window and evaluate immediately.
    #[instrument(skip(self))]
    pub async fn arm(&self, request: ArmRequest) -> CoreResult<Schedule> {
        let now = Utc::now();
        if request.end <= request.start {
            return Err(CoreError::invalid("schedule end must be after its start"));
        }
        if request.end <= now {
            return Err(CoreError::invalid("schedule window is already over"));
        }
        if request.interval_secs == 0 {
            return Err(CoreError::invalid("capture interval must be at least 1 second"));
        }
        if request.frame_rate == 0 {
            return Err(CoreError::invalid("frame rate must be positive"));
        }

        let schedule = Schedule {
            id: Uuid::new_v4(),
            start: request.start,
            end: request.end,
            interval_secs: request.interval_secs,
            frame_rate: request.frame_rate,
            auto_encode: request.auto_encode,
            session_name: request
                .session_name
                .as_deref()
                .map(sanitize_session_name)
                .filter(|n| !n.is_empty()),
            created_at: now,
        };

        {
            let mut state = self.state.lock().await;
            state.schedules.push(schedule.clone());
            if let Err(e) = self.store.save(&state.schedules) {
                state.schedules.pop();
                return Err(e);
            }
        }

        info!(
            id = %schedule.id,
            start = %schedule.start,
            end = %schedule.end,
            session = %schedule.session_name(),
            "Schedule armed"
        );

        self.tick().await;
        Ok(schedule)
    }

    /// Delete a window. A session it is currently running is stopped
    /// without auto-encode.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> CoreResult<Schedule> {
        let mut state = self.state.lock().await;

        let position = state
            .schedules
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| CoreError::invalid(format!("no schedule with id {id}")))?;
        let removed = state.schedules.remove(position);
        if let Err(e) = self.store.save(&state.schedules) {
            state.schedules.insert(position, removed);
            return Err(e);
        }
        state.fired.remove(&id);

        info!(id = %id, "Schedule cancelled");

        let running = match &*self.capture.borrow() {
            CaptureStatus::Capturing(active) if active.schedule_id == Some(id) => {
                Some(active.name.clone())
            }
            _ => None,
        };
        if let Some(session) = running {
            let stop = StopParams::for_session(session, IntentOrigin::Scheduler);
            match self.intents.submit(Intent::Stop(stop)).await? {
                IntentOutcome::Stopped { report, .. } => {
                    info!(session = %report.session, "Cancelled window's session stopped");
                }
                other => debug!(outcome = ?other, "Cancelled window's stop had no effect"),
            }
        }

        Ok(removed)
    }

    /// All windows ordered by start.
    pub async fn list(&self) -> Vec<Schedule> {
        let mut schedules = self.state.lock().await.schedules.clone();
        schedules.sort_by_key(|s| s.start);
        schedules
    }

    /// Drop windows that have ended. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn cleanup(&self) -> CoreResult<usize> {
        let now = Utc::now();
        let running = match &*self.capture.borrow() {
            CaptureStatus::Capturing(active) | CaptureStatus::Stopping(active) => {
                active.schedule_id
            }
            CaptureStatus::Idle => None,
        };

        let mut state = self.state.lock().await;
        let before = state.schedules.clone();
        // The running window's stop still needs its auto-encode settings.
        state
            .schedules
            .retain(|s| !s.is_past(now) || Some(s.id) == running);
        let removed = before.len() - state.schedules.len();
        if removed == 0 {
            return Ok(0);
        }

        if let Err(e) = self.store.save(&state.schedules) {
            state.schedules = before;
            return Err(e);
        }

        let kept: HashSet<Uuid> = state.schedules.iter().map(|s| s.id).collect();
        state.fired.retain(|id| kept.contains(id));

        info!(removed, "Past schedules cleaned up");
        Ok(removed)
    }

    /// Evaluate once and act on the result.
    pub(crate) async fn tick(&self) {
        let mut state = self.state.lock().await;
        let capture = self.capture.borrow().clone();

        let Some(action) = plan(
            Utc::now(),
            &state.schedules,
            &capture,
            self.lease.is_idle(),
            &state.fired,
        ) else {
            return;
        };

        match action {
            PlannedAction::Start(schedule) => {
                let params = StartParams {
                    session_name: Some(schedule.session_name()),
                    interval_secs: schedule.interval_secs,
                    duration: None,
                    schedule_id: Some(schedule.id),
                    origin: IntentOrigin::Scheduler,
                };
                info!(id = %schedule.id, session = ?params.session_name, "Schedule window open, starting capture");

                match self.intents.submit(Intent::Start(params)).await {
                    Ok(IntentOutcome::Started(active)) => {
                        state.fired.insert(schedule.id);
                        info!(id = %schedule.id, session = %active.name, "Scheduled capture started");
                    }
                    Ok(IntentOutcome::Failed(e)) => {
                        warn!(id = %schedule.id, error = %e, "Scheduled capture failed to start");
                    }
                    Ok(other) => debug!(id = %schedule.id, outcome = ?other, "Scheduled start had no effect"),
                    Err(e) => warn!(error = %e, "Scheduled start not delivered"),
                }
            }
            PlannedAction::Stop { schedule, session } => {
                let mut stop = StopParams::for_session(session, IntentOrigin::Scheduler);
                if schedule.auto_encode {
                    stop = stop.with_encode(schedule.frame_rate);
                }
                info!(id = %schedule.id, auto_encode = schedule.auto_encode, "Schedule window closed, stopping capture");

                match self.intents.submit(Intent::Stop(stop)).await {
                    Ok(IntentOutcome::Stopped { report, encode }) => info!(
                        session = %report.session,
                        frames = report.frames_accepted,
                        encode = ?encode.map(|job| job.state),
                        "Scheduled capture stopped"
                    ),
                    Ok(other) => debug!(id = %schedule.id, outcome = ?other, "Scheduled stop had no effect"),
                    Err(e) => warn!(error = %e, "Scheduled stop not delivered"),
                }
            }
        }
    }

    /// Evaluate every tick until shutdown.
    pub(crate) async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period = ?self.settings.tick(), "Scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }

        info!("Scheduler stopped");
    }
}
