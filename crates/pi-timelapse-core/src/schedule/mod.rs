//! Persisted capture windows and their evaluator.

mod plan;
mod record;
mod scheduler;
mod store;

pub use record::{ArmRequest, Schedule};

pub(crate) use {
    plan::{PlannedAction, plan},
    record::ScheduleBook,
    scheduler::Scheduler,
    store::ScheduleStore,
};
