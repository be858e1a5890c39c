use crate::lease::Consumer;

use std::{fmt, panic::Location, path::PathBuf, time::Duration};

use error_location::ErrorLocation;
use thiserror::Error;

/// Why the camera (or the encode slot) could not be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyReason {
    /// A capture session owns the camera.
    Capturing,
    /// An encode job is queued or encoding.
    Encoding,
    /// Another consumer holds the camera lease.
    CameraHeld(Consumer),
    /// The live-view process was (re)spawned too recently.
    Respawning,
}

impl fmt::Display for BusyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusyReason::Capturing => write!(f, "capture session active"),
            BusyReason::Encoding => write!(f, "encode job in flight"),
            BusyReason::CameraHeld(consumer) => write!(f, "camera held by {consumer}"),
            BusyReason::Respawning => write!(f, "live view respawn rate-limited"),
        }
    }
}

/// Timelapse core errors with source location tracking.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The camera lease (or encode slot) is unavailable.
    #[error("Busy: {reason} {location}")]
    Busy {
        /// What is holding the resource.
        reason: BusyReason,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Free space pre-flight check failed.
    #[error("Insufficient storage at {path:?}: {available} bytes free, {required} required {location}")]
    InsufficientStorage {
        /// Directory that was checked.
        path: PathBuf,
        /// Bytes currently available.
        available: u64,
        /// Minimum bytes required.
        required: u64,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An external still/video/stream program failed or could not be run.
    #[error("External program {program} failed: {reason} {location}")]
    ExternalProgramFailure {
        /// Program that was invoked.
        program: String,
        /// Exit status or spawn failure description.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A bounded wait was exceeded.
    #[error("Timed out after {after:?} waiting for {operation} {location}")]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// How long we waited.
        after: Duration,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// A persisted record could not be read or parsed.
    #[error("Persisted record {path:?} unusable: {reason} {location}")]
    CorruptOrMissingPersistence {
        /// Record file path.
        path: PathBuf,
        /// Parse or read failure description.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Caller supplied parameters that can never succeed.
    #[error("Invalid request: {reason} {location}")]
    InvalidRequest {
        /// Description of the problem.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// No session directory with this name exists.
    #[error("Session not found: {name} {location}")]
    SessionNotFound {
        /// Requested session name.
        name: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An internal worker channel was closed.
    #[error("Channel closed: {channel} {location}")]
    ChannelClosed {
        /// Which channel.
        channel: &'static str,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// IO error from filesystem operations.
    #[error("IO error: {source} {location}")]
    Io {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl CoreError {
    /// Build a [`CoreError::Busy`] at the caller's location.
    #[track_caller]
    pub fn busy(reason: BusyReason) -> Self {
        CoreError::Busy {
            reason,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Build a [`CoreError::InvalidRequest`] at the caller's location.
    #[track_caller]
    pub fn invalid(reason: impl Into<String>) -> Self {
        CoreError::InvalidRequest {
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Build a [`CoreError::ExternalProgramFailure`] at the caller's location.
    #[track_caller]
    pub fn program(program: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::ExternalProgramFailure {
            program: program.into(),
            reason: reason.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// True for [`CoreError::Busy`].
    pub fn is_busy(&self) -> bool {
        matches!(self, CoreError::Busy { .. })
    }
}

// Manual From<io::Error> with location tracking.
// Cannot use #[from] because it does not support extra fields.
impl From<std::io::Error> for CoreError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        CoreError::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
