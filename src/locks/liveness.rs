//! Process liveness probe.

use super::metadata::{LockMetadata, local_hostname};

/// Result of probing a process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead,
    /// The check is unavailable or inconclusive; callers fall back to time.
    Unknown,
}

/// Probe whether `pid` names a running process on this host.
///
/// Uses `kill(pid, 0)`, which checks for existence without delivering a
/// signal. `EPERM` means the process exists under another user.
#[cfg(unix)]
pub fn probe(pid: u32) -> Liveness {
    if pid == std::process::id() {
        return Liveness::Alive;
    }
    // pid 0 and negative values address process groups.
    let Ok(pid_i32) = i32::try_from(pid) else {
        return Liveness::Unknown;
    };
    if pid_i32 <= 0 {
        return Liveness::Unknown;
    }

    // SAFETY: signal 0 performs permission and existence checks only.
    let result = unsafe { libc::kill(pid_i32, 0) };
    if result == 0 {
        return Liveness::Alive;
    }

    match std::io::Error::last_os_error().raw_os_error() {
        Some(libc::ESRCH) => Liveness::Dead,
        Some(libc::EPERM) => Liveness::Alive,
        _ => Liveness::Unknown,
    }
}

#[cfg(not(unix))]
pub fn probe(pid: u32) -> Liveness {
    if pid == std::process::id() {
        Liveness::Alive
    } else {
        Liveness::Unknown
    }
}

/// Probe the owner of a holder record.
///
/// Process ids are only meaningful on the host that issued them, so records
/// written on another host are always `Unknown`.
pub fn probe_owner(metadata: &LockMetadata) -> Liveness {
    if metadata.host != local_hostname() {
        return Liveness::Unknown;
    }
    probe(metadata.pid)
}
