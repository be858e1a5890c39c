//! Single-worker FIFO encode queue.

mod job;
mod queue;
mod worker;

pub use {
    job::{JobFailure, JobState, JobStatus},
    queue::EncodeQueue,
};

pub(crate) use {queue::EncodeContext, worker::EncodeWorker};

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// Latest status per session, written by the queue and the worker.
type JobTable = Arc<RwLock<HashMap<String, JobStatus>>>;

fn update_job(jobs: &JobTable, session: &str, apply: impl FnOnce(&mut JobStatus)) {
    let mut table = jobs.write().unwrap_or_else(|e| e.into_inner());
    if let Some(status) = table.get_mut(session) {
        apply(status);
    }
}
