//! Free-space pre-flight checks.

use crate::{CoreError, CoreResult};

use std::{
    io,
    panic::Location,
    path::{Path, PathBuf},
};

use error_location::ErrorLocation;
use sysinfo::Disks;
use tracing::{debug, warn};

/// Reports how much space is left on the filesystem holding a path.
pub trait StorageProbe: Send + Sync {
    /// Bytes available to unprivileged writers under `path`.
    fn available_bytes(&self, path: &Path) -> CoreResult<u64>;
}

/// [`StorageProbe`] backed by the OS disk list.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemStorage;

impl StorageProbe for SystemStorage {
    fn available_bytes(&self, path: &Path) -> CoreResult<u64> {
        let target = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let disks = Disks::new_with_refreshed_list();

        // Longest mount point that prefixes the target wins.
        let disk = disks
            .list()
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| CoreError::Io {
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no mounted filesystem contains {}", target.display()),
                ),
                location: ErrorLocation::from(Location::caller()),
            })?;

        debug!(
            path = ?target,
            mount_point = ?disk.mount_point(),
            available = disk.available_space(),
            "Free space probed"
        );

        Ok(disk.available_space())
    }
}

/// Refuse with [`CoreError::InsufficientStorage`] when `path` has less than
/// `required` bytes free.
///
/// A probe that cannot determine free space is logged and treated as a pass;
/// the subsequent write surfaces any real problem.
#[track_caller]
pub(crate) fn ensure_free_space(
    probe: &dyn StorageProbe,
    path: &Path,
    required: u64,
) -> CoreResult<()> {
    let available = match probe.available_bytes(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = ?path, error = %e, "Free space unknown, skipping check");
            return Ok(());
        }
    };

    if available < required {
        return Err(CoreError::InsufficientStorage {
            path: PathBuf::from(path),
            available,
            required,
            location: ErrorLocation::from(Location::caller()),
        });
    }

    Ok(())
}
