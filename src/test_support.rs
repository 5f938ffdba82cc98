use crate::config::Config;
use crate::context::DataContext;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// Restores an environment variable on drop. Tests using it must be `#[serial]`.
pub(crate) struct EnvGuard {
    key: &'static str,
    original: Option<OsString>,
}

impl EnvGuard {
    pub(crate) fn set(key: &'static str, value: &Path) -> Self {
        let original = std::env::var_os(key);
        // SAFETY: callers are #[serial], so no other test thread touches the environment.
        unsafe { std::env::set_var(key, value) };
        Self { key, original }
    }

    pub(crate) fn unset(key: &'static str) -> Self {
        let original = std::env::var_os(key);
        // SAFETY: as in `set`.
        unsafe { std::env::remove_var(key) };
        Self { key, original }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: as in `set`.
        unsafe {
            match &self.original {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }
}

/// A fresh, initialized data root with fast lock timings.
pub(crate) fn create_test_root() -> (TempDir, DataContext, Config) {
    let temp_dir = TempDir::new().unwrap();
    let ctx = DataContext::resolve_from(temp_dir.path()).unwrap();
    std::fs::create_dir_all(&ctx.locks_dir).unwrap();
    std::fs::create_dir_all(&ctx.data_dir).unwrap();
    std::fs::create_dir_all(ctx.events_dir()).unwrap();

    let config = Config {
        lock_acquire_timeout_ms: 5_000,
        lock_retry_interval_ms: 5,
        ..Config::default()
    };
    (temp_dir, ctx, config)
}
