//! Atomic filesystem operations for warden.
//!
//! All atomic writes follow this pattern:
//! 1. Write content to a uniquely named temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Atomically replace the original file with `rename()`
//!
//! Readers therefore observe either the previous content or the new content,
//! never a partial write. Source and destination are always in the same
//! directory, so the rename never crosses a filesystem boundary.
//!
//! On a crash a temporary file may remain (named `.{filename}.{id}.tmp`).
//! Temporary files start with a dot so directory scans can skip them.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Atomically write bytes to a file.
///
/// Parent directories are created as needed. Concurrent writers to the same
/// target each use their own temporary file; the last rename wins.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> io::Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let temp_path = staging_path(path)?;
    write_and_sync(&temp_path, content)?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    sync_parent(path);
    Ok(())
}

/// Atomically write a string to a file.
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> io::Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Generate a unique temporary path next to `target`.
pub(crate) fn staging_path(target: &Path) -> io::Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file path '{}'", target.display()),
            )
        })?;

    let temp_name = format!(".{}.{}.tmp", filename, Uuid::new_v4().simple());
    Ok(parent.join(temp_name))
}

/// Write content to a fresh file and sync it to disk.
///
/// The file must not already exist; staging names are unique per call.
pub(crate) fn write_and_sync(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = File::options().write(true).create_new(true).open(path)?;

    let written = file.write_all(content).and_then(|()| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(path);
        return Err(e);
    }

    Ok(())
}

/// Best-effort fsync of the directory holding `path` so the entry is durable.
#[cfg(unix)]
pub(crate) fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
pub(crate) fn sync_parent(_path: &Path) {}
