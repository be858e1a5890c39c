//! Camera device arbitration.
//!
//! The whole lease state is a single [`LeaseSnapshot`] held in a
//! `watch::Sender`, so every check-and-set is one atomic
//! `send_if_modified` call and observers (the live-view supervisor) are
//! woken whenever idleness changes. Nothing here ever waits.

use crate::{
    BusyReason,
    lease::{Consumer, EncodeSlot, LeaseGuard},
};

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{debug, info};

/// Point-in-time view of who owns the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeaseSnapshot {
    /// Current holder of the device, if any.
    pub holder: Option<Consumer>,
    /// A capture session is active.
    pub capturing: bool,
    /// An encode job is queued or encoding.
    pub encode_in_flight: bool,
    /// A live-view or still holder that capture took the camera from and
    /// that has not released yet.
    pub displaced: Option<Consumer>,
}

impl LeaseSnapshot {
    /// No active session and no in-flight encode job.
    pub fn is_idle(&self) -> bool {
        !self.capturing && !self.encode_in_flight
    }

    /// Why a live-view or still consumer would be refused right now.
    pub fn busy_reason(&self) -> Option<BusyReason> {
        if self.capturing {
            Some(BusyReason::Capturing)
        } else if self.encode_in_flight {
            Some(BusyReason::Encoding)
        } else {
            self.holder.or(self.displaced).map(BusyReason::CameraHeld)
        }
    }
}

/// Mutual-exclusion token over the camera device.
///
/// Cheap to clone; all clones share one state.
#[derive(Debug, Clone)]
pub struct CameraLease {
    state: Arc<watch::Sender<LeaseSnapshot>>,
}

impl CameraLease {
    /// Create an idle, unheld lease.
    pub fn new() -> Self {
        let (state, _) = watch::channel(LeaseSnapshot::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Current lease state.
    pub fn snapshot(&self) -> LeaseSnapshot {
        *self.state.borrow()
    }

    /// True iff no session is capturing and no encode job is in flight.
    pub fn is_idle(&self) -> bool {
        self.state.borrow().is_idle()
    }

    /// Observe lease changes.
    pub fn subscribe(&self) -> watch::Receiver<LeaseSnapshot> {
        self.state.subscribe()
    }

    /// Attempt to take the camera for `consumer`.
    ///
    /// Live view and still capture succeed only while idle and unheld.
    /// Capture succeeds whenever idle and displaces a live-view or still
    /// holder, which must then be torn down by the caller. The displaced
    /// consumer keeps the camera busy for everyone else until it releases;
    /// see [`wait_displaced`](Self::wait_displaced).
    pub fn try_acquire(&self, consumer: Consumer) -> bool {
        let acquired = self.state.send_if_modified(|lease| {
            if !lease.is_idle() {
                return false;
            }
            match consumer {
                Consumer::Capture => {
                    if lease.holder.is_some() {
                        lease.displaced = lease.holder;
                    }
                    lease.capturing = true;
                    lease.holder = Some(Consumer::Capture);
                    true
                }
                Consumer::LiveView | Consumer::Still => {
                    if lease.holder.is_some() || lease.displaced.is_some() {
                        return false;
                    }
                    lease.holder = Some(consumer);
                    true
                }
            }
        });

        debug!(consumer = %consumer, acquired, "Lease acquire attempt");
        acquired
    }

    /// RAII flavour of [`try_acquire`](Self::try_acquire).
    pub fn acquire(&self, consumer: Consumer) -> Option<LeaseGuard> {
        self.try_acquire(consumer)
            .then(|| LeaseGuard::new(self.clone(), consumer))
    }

    /// Give the camera back. A displaced consumer only clears its displaced mark.
    pub fn release(&self, consumer: Consumer) {
        let released = self.state.send_if_modified(|lease| {
            let mut changed = false;
            if lease.displaced == Some(consumer) {
                lease.displaced = None;
                changed = true;
            }
            if lease.holder == Some(consumer) {
                lease.holder = None;
                changed = true;
            }
            if consumer == Consumer::Capture && lease.capturing {
                lease.capturing = false;
                changed = true;
            }
            changed
        });

        if released {
            info!(consumer = %consumer, "Camera lease released");
        }
    }

    /// Wait until a displaced consumer has released the camera.
    ///
    /// Returns the consumer still holding on if `timeout` elapses first.
    pub async fn wait_displaced(&self, timeout: Duration) -> Option<Consumer> {
        let mut rx = self.state.subscribe();
        let released = rx.wait_for(|lease| lease.displaced.is_none());
        match tokio::time::timeout(timeout, released).await {
            Ok(_) => None,
            Err(_) => self.snapshot().displaced,
        }
    }

    /// Claim the single encode slot. `None` if a job is already in flight.
    pub fn try_begin_encode(&self) -> Option<EncodeSlot> {
        let claimed = self.state.send_if_modified(|lease| {
            if lease.encode_in_flight {
                return false;
            }
            lease.encode_in_flight = true;
            true
        });

        claimed.then(|| EncodeSlot::new(self.clone()))
    }

    pub(crate) fn end_encode(&self) {
        self.state.send_if_modified(|lease| {
            let was = lease.encode_in_flight;
            lease.encode_in_flight = false;
            was
        });
    }
}

impl Default for CameraLease {
    fn default() -> Self {
        Self::new()
    }
}
