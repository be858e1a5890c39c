use crate::lease::CameraLease;

/// RAII claim on the single in-flight encode job.
///
/// Travels with the job from `enqueue` through the worker; dropping it
/// (job finished, job discarded, worker gone) clears the in-flight flag.
#[derive(Debug)]
pub struct EncodeSlot {
    lease: CameraLease,
}

impl EncodeSlot {
    pub(crate) fn new(lease: CameraLease) -> Self {
        Self { lease }
    }
}

impl Drop for EncodeSlot {
    fn drop(&mut self) {
        self.lease.end_encode();
    }
}
