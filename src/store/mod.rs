//! Locked record storage for warden.
//!
//! Every read and write of a record goes through [`with_lock`]: reads take a
//! shared lock, writes an exclusive one. A fresh lock handle is created per
//! operation and never cached, so a crashed caller leaves behind at most a
//! stale holder that the next waiter can reap.
//!
//! Records are addressed by relative names under a base directory
//! (`.warden/data/` for [`Store::open`]). The lock resource for a record is
//! its path relative to `.warden/`, e.g. `data/retros/index.json`.

mod names;


pub use names::{RecordPath, normalize_name};

use crate::config::Config;
use crate::context::DataContext;
use crate::error::{Result, WardenError};
use crate::fs::atomic_write;
use crate::locks::{LockMode, LockOptions, MarkerStore, with_lock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// JSON and NDJSON records under one base directory, guarded by file locks.
#[derive(Debug, Clone)]
pub struct Store {
    base: PathBuf,
    prefix: String,
    markers: MarkerStore,
    options: LockOptions,
}

impl Store {
    /// Open the record store at `.warden/data/`.
    pub fn open(ctx: &DataContext, config: &Config) -> Self {
        Self::open_at(ctx, config, "data")
    }

    /// Open a store rooted at `.warden/<subdir>/`.
    pub fn open_at(ctx: &DataContext, config: &Config, subdir: &str) -> Self {
        Self {
            base: ctx.state_dir.join(subdir),
            prefix: subdir.trim_matches('/').to_string(),
            markers: MarkerStore::new(&ctx.locks_dir),
            options: config.lock_options(),
        }
    }

    /// Base directory of the records.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Lock primitives shared by every operation of this store.
    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    /// Resolve a record name to its file and lock resource.
    pub fn record(&self, name: &str) -> Result<RecordPath> {
        RecordPath::new(&self.base, &self.prefix, name)
    }

    /// Read a JSON record, `None` if it does not exist.
    pub async fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let record = self.record(name)?;
        self.locked(&record, LockMode::Shared, || async {
            read_json_file(&record.path)
        })
        .await
    }

    /// Replace a JSON record atomically.
    pub async fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let record = self.record(name)?;
        let content = to_pretty_json(&record, value)?;
        self.locked(&record, LockMode::Exclusive, || async {
            write_file(&record.path, content.as_bytes())
        })
        .await
    }

    /// Read-modify-write a JSON record under one exclusive lock.
    ///
    /// `f` receives the current value (`None` if absent) and returns the new
    /// one, which is written and returned.
    pub async fn update_json<T, F>(&self, name: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> T,
    {
        let record = self.record(name)?;
        self.locked(&record, LockMode::Exclusive, || async {
            let current = read_json_file(&record.path)?;
            let updated = f(current);
            let content = to_pretty_json(&record, &updated)?;
            write_file(&record.path, content.as_bytes())?;
            Ok(updated)
        })
        .await
    }

    /// Append one record as a single JSON line.
    pub async fn append_jsonl<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let record = self.record(name)?;
        let line = serde_json::to_string(value).map_err(|e| {
            WardenError::StoreError(format!(
                "failed to serialize record for '{}': {}",
                record.resource, e
            ))
        })?;

        self.locked(&record, LockMode::Exclusive, || async {
            append_line(&record.path, &line)
        })
        .await
    }

    /// Read every record of an NDJSON file. A missing file reads as empty.
    pub async fn read_jsonl<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let record = self.record(name)?;
        self.locked(&record, LockMode::Shared, || async {
            let Some(content) = read_file(&record.path)? else {
                return Ok(Vec::new());
            };

            let mut records = Vec::new();
            for (index, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let value = serde_json::from_str(line).map_err(|e| {
                    WardenError::StoreError(format!(
                        "'{}' line {} is not valid JSON: {}",
                        record.resource,
                        index + 1,
                        e
                    ))
                })?;
                records.push(value);
            }
            Ok(records)
        })
        .await
    }

    /// Delete a record. Returns whether it existed.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let record = self.record(name)?;
        self.locked(&record, LockMode::Exclusive, || async {
            crate::fs::remove_if_exists(&record.path)
                .map_err(|e| io_error("failed to remove", &record.path, e))
        })
        .await
    }

    async fn locked<T, F, Fut>(&self, record: &RecordPath, mode: LockMode, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        debug!(resource = %record.resource, %mode, "store operation");
        with_lock(&self.markers, &record.resource, mode, &self.options, f).await
    }
}

fn io_error(action: &str, path: &Path, e: io::Error) -> WardenError {
    WardenError::StoreError(format!("{} '{}': {}", action, path.display(), e))
}

fn read_file(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error("failed to read", path, e)),
    }
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let Some(content) = read_file(path)? else {
        return Ok(None);
    };
    serde_json::from_str(&content).map(Some).map_err(|e| {
        WardenError::StoreError(format!("'{}' is not valid JSON: {}", path.display(), e))
    })
}

fn to_pretty_json<T: Serialize>(record: &RecordPath, value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| {
        WardenError::StoreError(format!(
            "failed to serialize record for '{}': {}",
            record.resource, e
        ))
    })
}

fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    atomic_write(path, content).map_err(|e| io_error("failed to write", path, e))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("failed to create directory", parent, e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error("failed to open", path, e))?;

    writeln!(file, "{}", line).map_err(|e| io_error("failed to append to", path, e))?;
    file.sync_all()
        .map_err(|e| io_error("failed to sync", path, e))
}
