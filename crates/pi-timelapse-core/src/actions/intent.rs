use crate::{
    BusyReason, CoreError, CoreResult,
    capture::{ActiveSession, StopReport},
    encode::JobStatus,
};

use std::{fmt, panic::Location, time::Duration};

use error_location::ErrorLocation;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Who asked for a transition. Carried for logging and stop filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOrigin {
    /// An operator through the caller layer.
    Manual,
    /// The schedule evaluator.
    Scheduler,
    /// A session's duration timer.
    Timer,
    /// The frame loop gave up after too many failed attempts.
    Watchdog,
}

impl fmt::Display for IntentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentOrigin::Manual => write!(f, "manual"),
            IntentOrigin::Scheduler => write!(f, "scheduler"),
            IntentOrigin::Timer => write!(f, "timer"),
            IntentOrigin::Watchdog => write!(f, "watchdog"),
        }
    }
}

/// Parameters of a start intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartParams {
    /// Requested session name; sanitised, or timestamped when empty.
    pub session_name: Option<String>,
    /// Seconds between frames. 0 selects `capture.default_interval_secs`.
    pub interval_secs: u32,
    /// Stop automatically after this long.
    pub duration: Option<Duration>,
    /// Schedule that fired this start.
    pub schedule_id: Option<Uuid>,
    /// Who asked.
    pub origin: IntentOrigin,
}

impl StartParams {
    /// Operator-issued start without a duration.
    pub fn manual(session_name: Option<String>, interval_secs: u32) -> Self {
        Self {
            session_name,
            interval_secs,
            duration: None,
            schedule_id: None,
            origin: IntentOrigin::Manual,
        }
    }

    /// Stop automatically after `duration`.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Parameters of a stop intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopParams {
    /// Only stop if this session is the active one. `None` stops whatever runs.
    pub expected_session: Option<String>,
    /// Enqueue an encode of the stopped session at this frame rate.
    pub encode_frame_rate: Option<u32>,
    /// Who asked.
    pub origin: IntentOrigin,
}

impl StopParams {
    /// Operator-issued stop of whatever session is active.
    pub fn manual() -> Self {
        Self {
            expected_session: None,
            encode_frame_rate: None,
            origin: IntentOrigin::Manual,
        }
    }

    /// Stop only `session`.
    pub fn for_session(session: impl Into<String>, origin: IntentOrigin) -> Self {
        Self {
            expected_session: Some(session.into()),
            encode_frame_rate: None,
            origin,
        }
    }

    /// Enqueue an encode of the stopped session.
    pub fn with_encode(mut self, frame_rate: u32) -> Self {
        self.encode_frame_rate = Some(frame_rate);
        self
    }
}

/// A requested capture transition. Advisory: it may be discarded when drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Begin a capture session.
    Start(StartParams),
    /// End the active capture session.
    Stop(StopParams),
}

impl Intent {
    /// Who asked.
    pub fn origin(&self) -> IntentOrigin {
        match self {
            Intent::Start(p) => p.origin,
            Intent::Stop(p) => p.origin,
        }
    }
}

/// Why a drained intent was dropped without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Start drained while the system was not idle.
    NotIdle(BusyReason),
    /// Stop addressed to a session that is no longer the active one.
    SessionMismatch,
}

/// What draining an intent did.
#[derive(Debug)]
pub enum IntentOutcome {
    /// A session is now capturing.
    Started(ActiveSession),
    /// The active session ended; `encode` holds the enqueue result if one was requested.
    Stopped {
        /// Summary of the finished session.
        report: StopReport,
        /// Status returned by the encode queue.
        encode: Option<JobStatus>,
    },
    /// Stop drained while nothing was capturing.
    AlreadyIdle,
    /// Intent dropped without effect.
    Discarded(DiscardReason),
    /// The transition was attempted and failed.
    Failed(CoreError),
}

#[derive(Debug)]
pub(crate) struct Envelope {
    pub intent: Intent,
    pub reply: Option<oneshot::Sender<IntentOutcome>>,
}

/// Submits intents to the action serializer.
///
/// Cheap to clone; every producer (caller layer, scheduler, duration timer,
/// frame-loop watchdog) holds one.
#[derive(Debug, Clone)]
pub struct IntentSender {
    tx: mpsc::Sender<Envelope>,
}

pub(crate) fn intent_channel(depth: usize) -> (IntentSender, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (IntentSender { tx }, rx)
}

impl IntentSender {
    /// Enqueue `intent` and wait until it has been drained.
    pub async fn submit(&self, intent: Intent) -> CoreResult<IntentOutcome> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(Envelope {
                intent,
                reply: Some(reply),
            })
            .await
            .map_err(|_| closed())?;

        outcome.await.map_err(|_| closed())
    }

    /// Enqueue `intent` without waiting for its outcome.
    pub async fn post(&self, intent: Intent) -> CoreResult<()> {
        self.tx
            .send(Envelope {
                intent,
                reply: None,
            })
            .await
            .map_err(|_| closed())
    }
}

#[track_caller]
fn closed() -> CoreError {
    CoreError::ChannelClosed {
        channel: "intent",
        location: ErrorLocation::from(Location::caller()),
    }
}
