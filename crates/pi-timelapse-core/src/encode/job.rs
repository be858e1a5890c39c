use std::fmt;

/// Lifecycle of an encode job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Accepted, waiting for the worker.
    Queued,
    /// The encoder is running.
    Encoding,
    /// Video written.
    Done,
    /// Rejected or failed.
    Error,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Encoding => write!(f, "encoding"),
            JobState::Done => write!(f, "done"),
            JobState::Error => write!(f, "error"),
        }
    }
}

/// Why a job ended in [`JobState::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure {
    /// Another job is queued or encoding.
    Busy,
    /// Free space below the encode threshold.
    LowDisk,
    /// No such session directory.
    SessionNotFound,
    /// The session holds no frames.
    NoFrames,
    /// The session is still capturing.
    SessionActive,
    /// The session's frames could not be listed.
    Io(String),
    /// The encoder exited nonzero or could not run.
    EncoderFailed(String),
    /// The worker is gone or its queue is full.
    WorkerUnavailable,
}

impl JobFailure {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            JobFailure::Busy => "busy",
            JobFailure::LowDisk => "low_disk",
            JobFailure::SessionNotFound => "session_not_found",
            JobFailure::NoFrames => "no_frames",
            JobFailure::SessionActive => "session_active",
            JobFailure::Io(_) => "io",
            JobFailure::EncoderFailed(_) => "encoder_failed",
            JobFailure::WorkerUnavailable => "worker_unavailable",
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFailure::Io(detail) | JobFailure::EncoderFailed(detail) => {
                write!(f, "{}: {detail}", self.code())
            }
            other => write!(f, "{}", other.code()),
        }
    }
}

/// Pollable view of one session's encode job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    /// Session being encoded.
    pub session: String,
    /// Output frame rate.
    pub frame_rate: u32,
    /// Where the job is.
    pub state: JobState,
    /// 0..=99 while encoding, 100 once done, 0 on error.
    pub progress: u8,
    /// Set when `state` is [`JobState::Error`].
    pub reason: Option<JobFailure>,
}

impl JobStatus {
    pub(crate) fn queued(session: &str, frame_rate: u32) -> Self {
        Self {
            session: session.to_string(),
            frame_rate,
            state: JobState::Queued,
            progress: 0,
            reason: None,
        }
    }

    pub(crate) fn rejected(session: &str, frame_rate: u32, reason: JobFailure) -> Self {
        Self {
            session: session.to_string(),
            frame_rate,
            state: JobState::Error,
            progress: 0,
            reason: Some(reason),
        }
    }

    /// Queued or encoding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, JobState::Queued | JobState::Encoding)
    }
}
