//! Create-if-absent file creation with content.
//!
//! `create_new` alone is atomic for the *existence* of a file, but the content
//! is written afterwards, so a concurrent reader can observe an empty or partial
//! file. Here the content is staged in a hidden temporary file first and then
//! published with `hard_link()`, which fails with `AlreadyExists` when the
//! target is taken. The target therefore appears with its full content or not
//! at all.
//!
//! Filesystems without hard link support fall back to `create_new` followed by
//! write + fsync. On those filesystems readers may briefly see a partial file.

use super::atomic::{staging_path, sync_parent, write_and_sync};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// Create `path` with `content` only if it does not exist yet.
///
/// Returns `Ok(true)` when this call created the file and `Ok(false)` when the
/// file already existed. Among any number of concurrent callers for the same
/// path, at most one receives `Ok(true)`.
pub fn create_exclusive<P: AsRef<Path>>(path: P, content: &[u8]) -> io::Result<bool> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(path)?;
    write_and_sync(&staging, content)?;

    let created = match fs::hard_link(&staging, path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        // vfat-style mounts report EPERM rather than ENOTSUP for link(2).
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
            ) =>
        {
            debug!(path = %path.display(), error = %e, "hard link refused, falling back to create_new");
            create_in_place(path, content)
        }
        Err(e) => Err(e),
    };

    let _ = fs::remove_file(&staging);
    if matches!(created, Ok(true)) {
        sync_parent(path);
    }
    created
}

fn create_in_place(path: &Path, content: &[u8]) -> io::Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };

    let written = file.write_all(content).and_then(|()| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(path);
        return Err(e);
    }

    Ok(true)
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether this call removed the file.
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    match fs::remove_file(path.as_ref()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
