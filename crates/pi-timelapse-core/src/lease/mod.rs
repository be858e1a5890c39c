mod camera_lease;
mod consumer;
mod encode_slot;
mod lease_guard;

pub use {
    camera_lease::{CameraLease, LeaseSnapshot},
    consumer::Consumer,
    encode_slot::EncodeSlot,
    lease_guard::LeaseGuard,
};
