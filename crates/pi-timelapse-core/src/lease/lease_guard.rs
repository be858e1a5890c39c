use crate::lease::{CameraLease, Consumer};

/// RAII guard that releases the camera lease when dropped.
///
/// Every acquisition path holds one of these, so early returns, errors
/// and panics in the holder all give the camera back.
#[derive(Debug)]
pub struct LeaseGuard {
    lease: CameraLease,
    consumer: Consumer,
}

impl LeaseGuard {
    pub(crate) fn new(lease: CameraLease, consumer: Consumer) -> Self {
        Self { lease, consumer }
    }

    /// Who this guard holds the camera for.
    pub fn consumer(&self) -> Consumer {
        self.consumer
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.lease.release(self.consumer);
    }
}
