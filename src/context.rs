//! Data root resolution for warden.
//!
//! Every command and every store operation locates its state through a
//! `DataContext`, so that all participants sharing a data root agree on where
//! locks, records, and events live:
//!
//! ```text
//! <root>/.warden/
//!   config.yaml
//!   locks/
//!   data/
//!   events/events.ndjson
//! ```

use crate::error::{Result, WardenError};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the state directory under the data root.
pub const STATE_DIR: &str = ".warden";

/// Environment variable naming the data root when `--root` is not given.
pub const HOME_ENV: &str = "WARDEN_HOME";

/// Resolved paths for one data root. All paths are absolute.
#[derive(Debug, Clone)]
pub struct DataContext {
    /// The data root chosen by the caller.
    pub root: PathBuf,

    /// `{root}/.warden/`
    pub state_dir: PathBuf,

    /// `{root}/.warden/locks/`
    pub locks_dir: PathBuf,

    /// `{root}/.warden/data/`
    pub data_dir: PathBuf,
}

impl DataContext {
    /// Resolve the data root: `root` if given, else `WARDEN_HOME`, else the
    /// current working directory.
    pub fn resolve(root: Option<&Path>) -> Result<Self> {
        if let Some(root) = root {
            return Self::resolve_from(root);
        }

        if let Some(home) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Self::resolve_from(PathBuf::from(home));
        }

        let cwd = env::current_dir().map_err(|e| {
            WardenError::UserError(format!("failed to get current working directory: {}", e))
        })?;
        Self::resolve_from(cwd)
    }

    /// Build the context for a specific root directory.
    pub fn resolve_from<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            env::current_dir()
                .map_err(|e| {
                    WardenError::UserError(format!(
                        "failed to get current working directory: {}",
                        e
                    ))
                })?
                .join(root)
        };

        let state_dir = root.join(STATE_DIR);
        Ok(Self {
            locks_dir: state_dir.join("locks"),
            data_dir: state_dir.join("data"),
            state_dir,
            root,
        })
    }

    /// Check if the state directory exists.
    pub fn is_initialized(&self) -> bool {
        self.state_dir.is_dir()
    }

    /// Ensure the data root is initialized, returning an error if not.
    ///
    /// Called by every command except `init`.
    pub fn ensure_initialized(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(WardenError::UserError(format!(
                "warden data root not initialized.\n\
                 Expected state directory at: {}\n\n\
                 Run `warden init` to initialize it.",
                self.state_dir.display()
            )));
        }
        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join(crate::config::types::CONFIG_FILE)
    }

    /// Get the path to the events directory.
    pub fn events_dir(&self) -> PathBuf {
        self.state_dir.join("events")
    }

    /// Get the path to the main events log file.
    pub fn events_file(&self) -> PathBuf {
        self.events_dir().join("events.ndjson")
    }
}
