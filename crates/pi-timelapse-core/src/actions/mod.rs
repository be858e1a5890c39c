//! Start/stop intents and their single consumer.

mod intent;
mod serializer;

pub use intent::{
    DiscardReason, Intent, IntentOrigin, IntentOutcome, IntentSender, StartParams, StopParams,
};

pub(crate) use {
    intent::{Envelope, intent_channel},
    serializer::ActionSerializer,
};
