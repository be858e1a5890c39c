//! Whole-record TOML files with atomic replace-on-write.
//!
//! A save writes a sibling temp file, syncs it, then renames it over the
//! target, so a reader sees either the previous record or the new one.

use crate::{CoreError, CoreResult};

use std::{
    fs,
    io::{ErrorKind, Write},
    marker::PhantomData,
    panic::Location,
    path::{Path, PathBuf},
};

use error_location::ErrorLocation;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

/// A single serde record stored at a fixed path.
#[derive(Debug, Clone)]
pub struct RecordFile<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> RecordFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Record stored at `path`. Nothing is touched until load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    /// Location of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path used while a save is in flight.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the whole record.
    ///
    /// `Ok(None)` when no record exists; [`CoreError::CorruptOrMissingPersistence`]
    /// when it exists but cannot be read or parsed.
    #[track_caller]
    pub fn load(&self) -> CoreResult<Option<T>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CoreError::CorruptOrMissingPersistence {
                    path: self.path.clone(),
                    reason: format!("read failed: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let record = toml::from_str(&contents).map_err(|e| {
            CoreError::CorruptOrMissingPersistence {
                path: self.path.clone(),
                reason: format!("parse failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;

        Ok(Some(record))
    }

    /// Atomically replace the record.
    #[track_caller]
    #[instrument(skip(self, record), fields(path = ?self.path))]
    pub fn save(&self, record: &T) -> CoreResult<()> {
        let contents = toml::to_string_pretty(record).map_err(|e| CoreError::InvalidRequest {
            reason: format!("record not serializable: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        let mut temp_file = fs::File::create(&temp_path)?;
        temp_file.write_all(contents.as_bytes())?;
        temp_file.sync_all()?;
        drop(temp_file);

        fs::rename(&temp_path, &self.path)?;

        // Make the rename itself durable.
        #[cfg(unix)]
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        debug!(bytes = contents.len(), "Record saved (atomic write)");

        Ok(())
    }

    /// Delete the record. Missing is fine.
    #[track_caller]
    pub fn remove(&self) -> CoreResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::from(e)),
        }
    }
}
