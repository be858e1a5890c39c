use pi_timelapse_core::{JobState, JobStatus};

use std::collections::HashMap;

/// Remembers the last seen state of every encode job so only changes are logged.
#[derive(Debug, Default)]
pub struct JobMonitor {
    last: HashMap<String, JobState>,
}

impl JobMonitor {
    /// Jobs whose state differs from the previous call.
    pub fn observe(&mut self, jobs: Vec<JobStatus>) -> Vec<JobStatus> {
        jobs.into_iter()
            .filter(|job| self.last.insert(job.session.clone(), job.state) != Some(job.state))
            .collect()
    }
}
