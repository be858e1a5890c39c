//! Session directories and frame naming.
//!
//! Each session is a directory under the sessions root holding
//! `000001.jpg`, `000002.jpg`, ... and, once encoded, `video.mp4`.

use crate::{BusyReason, CoreError, CoreResult};

use std::{
    fs,
    io::ErrorKind,
    panic::Location,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use error_location::ErrorLocation;
use tracing::{info, instrument};

/// Digits in a frame file name.
const FRAME_DIGITS: usize = 6;

/// printf-style pattern matching [`frame_file_name`], for the encoder.
pub const FRAME_PATTERN: &str = "%06d.jpg";

/// Encoded output inside a session directory.
pub const VIDEO_FILE: &str = "video.mp4";

/// File name for frame `index`.
pub fn frame_file_name(index: u64) -> String {
    format!("{index:0width$}.jpg", width = FRAME_DIGITS)
}

/// Index of a frame file name produced by [`frame_file_name`].
pub fn parse_frame_index(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(".jpg")?;
    if stem.len() < FRAME_DIGITS || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Keep only `[A-Za-z0-9_-]`.
pub fn sanitize_session_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// `session-YYYYMMDD-HHMMSS` for the given local time.
pub fn timestamped_session_name(at: DateTime<Local>) -> String {
    format!("session-{}", at.format("%Y%m%d-%H%M%S"))
}

/// Catalogue entry for one session directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session name.
    pub name: String,
    /// Session directory.
    pub dir: PathBuf,
    /// Number of frame files.
    pub frame_count: u64,
    /// File name of the highest-numbered frame.
    pub latest_frame: Option<String>,
    /// Whether `video.mp4` exists.
    pub has_video: bool,
}

/// Filesystem view of all sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Sessions live under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Sessions root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `name` (not necessarily existing).
    pub fn session_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Encoded video path for `name`.
    pub fn video_path(&self, name: &str) -> PathBuf {
        self.session_dir(name).join(VIDEO_FILE)
    }

    /// Create the session directory if needed.
    #[track_caller]
    pub fn ensure(&self, name: &str) -> CoreResult<PathBuf> {
        let dir = self.session_dir(name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Sorted frame indices present in the session.
    #[track_caller]
    pub fn frame_indices(&self, name: &str) -> CoreResult<Vec<u64>> {
        let dir = self.session_dir(name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CoreError::SessionNotFound {
                    name: name.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Err(e) => return Err(CoreError::from(e)),
        };

        let mut indices: Vec<u64> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_frame_index(&entry.file_name().to_string_lossy()))
            .collect();
        indices.sort_unstable();

        Ok(indices)
    }

    /// Index the next accepted frame should take: one past the highest
    /// existing frame, or 1 for an empty or new session.
    #[track_caller]
    pub fn next_frame_index(&self, name: &str) -> CoreResult<u64> {
        match self.frame_indices(name) {
            Ok(indices) => Ok(indices.last().map_or(1, |last| last + 1)),
            Err(CoreError::SessionNotFound { .. }) => Ok(1),
            Err(e) => Err(e),
        }
    }

    /// Catalogue entry for one session.
    #[track_caller]
    pub fn info(&self, name: &str) -> CoreResult<SessionInfo> {
        let indices = self.frame_indices(name)?;
        Ok(SessionInfo {
            name: name.to_string(),
            dir: self.session_dir(name),
            frame_count: indices.len() as u64,
            latest_frame: indices.last().map(|i| frame_file_name(*i)),
            has_video: self.video_path(name).exists(),
        })
    }

    /// All sessions, newest name first.
    #[track_caller]
    pub fn list(&self) -> CoreResult<Vec<SessionInfo>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::from(e)),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort_unstable_by(|a, b| b.cmp(a));

        names.iter().map(|name| self.info(name)).collect()
    }

    /// Path of the highest-numbered frame, for previews.
    #[track_caller]
    pub fn latest_frame(&self, name: &str) -> CoreResult<Option<PathBuf>> {
        let indices = self.frame_indices(name)?;
        Ok(indices
            .last()
            .map(|i| self.session_dir(name).join(frame_file_name(*i))))
    }

    /// Rename a session. Refused for the active session or an existing target.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn rename(&self, from: &str, to: &str, active: Option<&str>) -> CoreResult<String> {
        if active == Some(from) {
            return Err(CoreError::busy(BusyReason::Capturing));
        }

        let target = sanitize_session_name(to);
        if target.is_empty() {
            return Err(CoreError::invalid("new session name is empty"));
        }

        let old_dir = self.session_dir(from);
        if !old_dir.is_dir() {
            return Err(CoreError::SessionNotFound {
                name: from.to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let new_dir = self.session_dir(&target);
        if new_dir.exists() {
            return Err(CoreError::invalid(format!("session {target} already exists")));
        }

        fs::rename(&old_dir, &new_dir)?;
        info!(from, to = %target, "Session renamed");

        Ok(target)
    }

    /// Delete a session and everything in it. Refused for the active session.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn delete(&self, name: &str, active: Option<&str>) -> CoreResult<()> {
        if active == Some(name) {
            return Err(CoreError::busy(BusyReason::Capturing));
        }

        let dir = self.session_dir(name);
        if !dir.is_dir() {
            return Err(CoreError::SessionNotFound {
                name: name.to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        fs::remove_dir_all(&dir)?;
        info!(session = name, "Session deleted");

        Ok(())
    }
}
