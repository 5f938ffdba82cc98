//! On-disk markers and reader tokens.
//!
//! Each resource gets its own namespace directory under the locks root:
//!
//! ```text
//! locks/
//!   retros%2Findex.json.lock/
//!     exclusive            <- exclusive marker (holder record inside)
//!     readers/
//!       <token>.token      <- one file per shared holder
//! ```
//!
//! Markers and tokens are published with `create_exclusive`, so they appear
//! together with their holder record or not at all. Nothing outside a
//! resource's namespace is ever touched.
//!
//! Removing or rewriting an existing marker or token reads the record and
//! then acts on the path, so it runs under the namespace guard: an OS file
//! lock on `<namespace>/.guard`. Creation needs no guard. A marker path only
//! becomes free through a guarded removal, so while the guard is held the
//! record that was read is the one that gets removed or rewritten. The OS
//! drops the guard when its process exits.

use super::error::LockError;
use super::metadata::{LockMetadata, MetadataError};
use super::types::{HolderInfo, HolderKind, LockMode};
use crate::fs::{create_exclusive, remove_if_exists};
use fs4::fs_std::FileExt;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

const NAMESPACE_SUFFIX: &str = ".lock";
const EXCLUSIVE_MARKER: &str = "exclusive";
const READERS_DIR: &str = "readers";
const TOKEN_EXTENSION: &str = "token";
const GUARD_FILE: &str = ".guard";

/// Exclusive OS lock on a namespace's guard file, released on drop.
#[derive(Debug)]
struct NamespaceGuard {
    _file: File,
}

/// Filesystem primitives for lock state, rooted at a locks directory.
///
/// Holds no state besides the root path; cloning is cheap.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    root: PathBuf,
}

impl MarkerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The locks directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Namespace directory for a resource.
    pub fn namespace(&self, resource: &str) -> PathBuf {
        self.root
            .join(format!("{}{}", encode_resource(resource), NAMESPACE_SUFFIX))
    }

    pub fn exclusive_path(&self, resource: &str) -> PathBuf {
        self.namespace(resource).join(EXCLUSIVE_MARKER)
    }

    pub fn readers_dir(&self, resource: &str) -> PathBuf {
        self.namespace(resource).join(READERS_DIR)
    }

    pub fn reader_path(&self, resource: &str, token: &str) -> PathBuf {
        self.readers_dir(resource)
            .join(format!("{}.{}", token, TOKEN_EXTENSION))
    }

    /// Atomically create the exclusive marker carrying `metadata`.
    ///
    /// Returns whether this call created it. Reader tokens are not consulted;
    /// the acquisition engine checks them after winning the marker.
    pub fn try_create_exclusive(
        &self,
        resource: &str,
        metadata: &LockMetadata,
    ) -> Result<bool, LockError> {
        let path = self.exclusive_path(resource);
        create_exclusive(&path, metadata.to_json().as_bytes()).map_err(|e| {
            LockError::io(
                format!("failed to create lock marker '{}'", path.display()),
                e,
            )
        })
    }

    /// Create a reader token named after `metadata.token`, unless an exclusive
    /// marker exists.
    ///
    /// The token is published first and the marker checked afterwards. A
    /// writer does the reverse (marker, then tokens), so of two racing
    /// parties at least one observes the other and backs off.
    pub fn try_create_reader_token(
        &self,
        resource: &str,
        metadata: &LockMetadata,
    ) -> Result<bool, LockError> {
        let token = metadata.token.as_str();
        let path = self.reader_path(resource, token);

        // Token ids are unique per handle, so an existing file is already ours.
        create_exclusive(&path, metadata.to_json().as_bytes()).map_err(|e| {
            LockError::io(
                format!("failed to create reader token '{}'", path.display()),
                e,
            )
        })?;

        match self.has_exclusive(resource) {
            Ok(false) => Ok(true),
            Ok(true) => {
                self.remove_reader_token(resource, token)?;
                Ok(false)
            }
            Err(e) => {
                if let Err(rollback) = self.remove_reader_token(resource, token) {
                    warn!(resource, token, error = %rollback, "failed to withdraw reader token");
                }
                Err(e)
            }
        }
    }

    /// Remove the exclusive marker regardless of its holder.
    pub fn remove_exclusive(&self, resource: &str) -> Result<bool, LockError> {
        let Some(_guard) = self.guard(resource)? else {
            return Ok(false);
        };
        self.unlink_exclusive(resource)
    }

    /// Remove the exclusive marker only if `matches` accepts its current record.
    ///
    /// `matches` receives `None` when the record is corrupt. A marker that is
    /// already gone is left alone and reported as not removed.
    pub fn remove_exclusive_if<F>(&self, resource: &str, matches: F) -> Result<bool, LockError>
    where
        F: FnOnce(Option<&LockMetadata>) -> bool,
    {
        let Some(_guard) = self.guard(resource)? else {
            return Ok(false);
        };
        let Some(holder) = self.read_exclusive(resource)? else {
            return Ok(false);
        };

        if !matches(holder.metadata.as_ref()) {
            return Ok(false);
        }
        self.unlink_exclusive(resource)
    }

    /// Remove a reader token by its owner.
    ///
    /// Token ids are unique per handle, so the file can only be the caller's.
    pub fn remove_reader_token(&self, resource: &str, token: &str) -> Result<bool, LockError> {
        let path = self.reader_path(resource, token);
        remove_if_exists(&path).map_err(|e| {
            LockError::io(
                format!("failed to remove reader token '{}'", path.display()),
                e,
            )
        })
    }

    /// Remove someone else's reader token only if `matches` accepts its
    /// current record.
    pub fn remove_reader_token_if<F>(
        &self,
        resource: &str,
        token: &str,
        matches: F,
    ) -> Result<bool, LockError>
    where
        F: FnOnce(Option<&LockMetadata>) -> bool,
    {
        let Some(_guard) = self.guard(resource)? else {
            return Ok(false);
        };
        let Some(holder) = self.read_reader(resource, token)? else {
            return Ok(false);
        };

        if !matches(holder.metadata.as_ref()) {
            return Ok(false);
        }
        self.remove_reader_token(resource, token)
    }

    /// Refresh `updated_at` on the marker or token carrying `token`.
    ///
    /// Returns `false` when the artifact is gone, corrupt, or carries another
    /// token. A missing artifact is never re-created.
    pub fn renew(&self, resource: &str, mode: LockMode, token: &str) -> Result<bool, LockError> {
        let Some(_guard) = self.guard(resource)? else {
            return Ok(false);
        };
        let holder = match mode {
            LockMode::Exclusive => self.read_exclusive(resource)?,
            LockMode::Shared => self.read_reader(resource, token)?,
        };
        let Some(HolderInfo {
            path,
            metadata: Some(mut metadata),
            ..
        }) = holder
        else {
            return Ok(false);
        };
        if metadata.token != token {
            return Ok(false);
        }

        metadata.touch();
        metadata.write_to(&path).map_err(|e| {
            LockError::io(
                format!("failed to renew holder record '{}'", path.display()),
                e,
            )
        })?;
        Ok(true)
    }

    /// Take the namespace guard, blocking until it is free.
    ///
    /// `None` when the namespace does not exist yet, in which case there is
    /// nothing to remove or rewrite.
    fn guard(&self, resource: &str) -> Result<Option<NamespaceGuard>, LockError> {
        let path = self.namespace(resource).join(GUARD_FILE);
        let file = match OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LockError::io(
                    format!("failed to open namespace guard '{}'", path.display()),
                    e,
                ));
            }
        };

        FileExt::lock_exclusive(&file).map_err(|e| {
            LockError::io(
                format!("failed to lock namespace guard '{}'", path.display()),
                e,
            )
        })?;
        Ok(Some(NamespaceGuard { _file: file }))
    }

    /// Callers hold the namespace guard.
    fn unlink_exclusive(&self, resource: &str) -> Result<bool, LockError> {
        let path = self.exclusive_path(resource);
        remove_if_exists(&path).map_err(|e| {
            LockError::io(
                format!("failed to remove lock marker '{}'", path.display()),
                e,
            )
        })
    }

    pub fn list_reader_tokens(&self, resource: &str) -> Result<BTreeSet<String>, LockError> {
        let dir = self.readers_dir(resource);
        let mut tokens = BTreeSet::new();

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(tokens),
            Err(e) => {
                return Err(LockError::io(
                    format!("failed to read reader tokens in '{}'", dir.display()),
                    e,
                ));
            }
        };

        for entry in entries {
            let entry = entry.map_err(|e| {
                LockError::io(format!("failed to read entry in '{}'", dir.display()), e)
            })?;
            let path = entry.path();

            // Skip staging files and anything that is not a token.
            if path.extension().and_then(|e| e.to_str()) != Some(TOKEN_EXTENSION) {
                continue;
            }
            if let Some(token) = path.file_stem().and_then(|s| s.to_str())
                && !token.starts_with('.')
            {
                tokens.insert(token.to_string());
            }
        }

        Ok(tokens)
    }

    pub fn has_exclusive(&self, resource: &str) -> Result<bool, LockError> {
        let path = self.exclusive_path(resource);
        match fs::symlink_metadata(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LockError::io(
                format!("failed to inspect lock marker '{}'", path.display()),
                e,
            )),
        }
    }

    /// Whether any holder, exclusive or shared, exists.
    pub fn has_any(&self, resource: &str) -> Result<bool, LockError> {
        Ok(self.has_exclusive(resource)? || !self.list_reader_tokens(resource)?.is_empty())
    }

    /// Snapshot of the exclusive marker, `None` if absent.
    pub fn read_exclusive(&self, resource: &str) -> Result<Option<HolderInfo>, LockError> {
        read_holder(HolderKind::Exclusive, self.exclusive_path(resource))
    }

    /// Snapshot of one reader token, `None` if absent.
    pub fn read_reader(&self, resource: &str, token: &str) -> Result<Option<HolderInfo>, LockError> {
        read_holder(
            HolderKind::Reader {
                token: token.to_string(),
            },
            self.reader_path(resource, token),
        )
    }

    /// Snapshot of every reader token.
    pub fn read_readers(&self, resource: &str) -> Result<Vec<HolderInfo>, LockError> {
        let mut holders = Vec::new();
        for token in self.list_reader_tokens(resource)? {
            if let Some(holder) = self.read_reader(resource, &token)? {
                holders.push(holder);
            }
        }
        Ok(holders)
    }

    /// Every holder at a resource: the exclusive marker first, then readers.
    pub fn holders(&self, resource: &str) -> Result<Vec<HolderInfo>, LockError> {
        let mut holders = Vec::new();
        if let Some(exclusive) = self.read_exclusive(resource)? {
            holders.push(exclusive);
        }
        holders.extend(self.read_readers(resource)?);
        Ok(holders)
    }

    /// Remove every marker and token at a resource. Returns how many were removed.
    pub fn clear(&self, resource: &str) -> Result<usize, LockError> {
        let Some(_guard) = self.guard(resource)? else {
            return Ok(0);
        };
        let mut removed = usize::from(self.unlink_exclusive(resource)?);
        for token in self.list_reader_tokens(resource)? {
            removed += usize::from(self.remove_reader_token(resource, &token)?);
        }
        Ok(removed)
    }

    /// Names of every resource that has a namespace directory, sorted.
    ///
    /// A namespace may exist with no holders left in it.
    pub fn resources(&self) -> Result<Vec<String>, LockError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LockError::io(
                    format!("failed to read locks directory '{}'", self.root.display()),
                    e,
                ));
            }
        };

        let mut resources = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                LockError::io(
                    format!("failed to read entry in '{}'", self.root.display()),
                    e,
                )
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(encoded) = name.strip_suffix(NAMESPACE_SUFFIX)
                && let Some(resource) = decode_resource(encoded)
            {
                resources.push(resource);
            }
        }

        resources.sort();
        Ok(resources)
    }
}

fn read_holder(kind: HolderKind, path: PathBuf) -> Result<Option<HolderInfo>, LockError> {
    let metadata = match LockMetadata::from_file(&path) {
        Ok(meta) => Some(meta),
        Err(MetadataError::Corrupt(_)) => None,
        Err(MetadataError::Missing) => return Ok(None),
        Err(MetadataError::Io(e)) => {
            return Err(LockError::io(
                format!("failed to read holder record '{}'", path.display()),
                e,
            ));
        }
    };

    Ok(Some(HolderInfo {
        kind,
        path,
        metadata,
        stale: None,
    }))
}

/// Map a logical resource name onto a single path component.
///
/// Unreserved characters pass through; every other byte becomes `%XX`.
pub(crate) fn encode_resource(resource: &str) -> String {
    let mut out = String::with_capacity(resource.len());
    for byte in resource.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

pub(crate) fn decode_resource(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, MarkerStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = MarkerStore::new(temp_dir.path().join("locks"));
        (temp_dir, store)
    }

    #[test]
    fn resource_names_round_trip_through_encoding() {
        for name in ["plain", "retros/2024-05.jsonl", "with space", "ünï", "a%b"] {
            let encoded = encode_resource(name);
            assert!(!encoded.contains('/'));
            assert_eq!(decode_resource(&encoded).as_deref(), Some(name));
        }
        assert_eq!(decode_resource("bad%z"), None);
    }

    #[test]
    fn exclusive_marker_is_created_once() {
        let (_tmp, store) = store();
        let a = LockMetadata::new("a", LockMode::Exclusive);
        let b = LockMetadata::new("b", LockMode::Exclusive);

        assert!(store.try_create_exclusive("r", &a).unwrap());
        assert!(!store.try_create_exclusive("r", &b).unwrap());
        assert!(store.has_exclusive("r").unwrap());

        let holder = store.read_exclusive("r").unwrap().unwrap();
        assert_eq!(holder.token(), Some("a"));
    }

    #[test]
    fn reader_token_refused_while_exclusive_held() {
        let (_tmp, store) = store();
        let writer = LockMetadata::new("w", LockMode::Exclusive);
        let reader = LockMetadata::new("r1", LockMode::Shared);

        store.try_create_exclusive("r", &writer).unwrap();
        assert!(!store.try_create_reader_token("r", &reader).unwrap());
        assert!(store.list_reader_tokens("r").unwrap().is_empty());

        store.remove_exclusive("r").unwrap();
        assert!(store.try_create_reader_token("r", &reader).unwrap());
        let tokens: Vec<String> = store.list_reader_tokens("r").unwrap().into_iter().collect();
        assert_eq!(tokens, vec!["r1".to_string()]);
    }

    #[test]
    fn removals_are_idempotent() {
        let (_tmp, store) = store();
        assert!(!store.remove_exclusive("r").unwrap());
        assert!(!store.remove_reader_token("r", "nobody").unwrap());

        let reader = LockMetadata::new("r1", LockMode::Shared);
        store.try_create_reader_token("r", &reader).unwrap();
        assert!(store.remove_reader_token("r", "r1").unwrap());
        assert!(!store.remove_reader_token("r", "r1").unwrap());
    }

    #[test]
    fn conditional_removal_checks_holder() {
        let (_tmp, store) = store();
        let a = LockMetadata::new("a", LockMode::Exclusive);
        store.try_create_exclusive("r", &a).unwrap();

        let removed = store
            .remove_exclusive_if("r", |m| m.is_some_and(|m| m.token == "b"))
            .unwrap();
        assert!(!removed);
        assert!(store.has_exclusive("r").unwrap());

        let removed = store
            .remove_exclusive_if("r", |m| m.is_some_and(|m| m.token == "a"))
            .unwrap();
        assert!(removed);
        assert!(!store.has_exclusive("r").unwrap());
    }

    #[test]
    fn corrupt_marker_reads_as_holder_without_metadata() {
        let (_tmp, store) = store();
        let path = store.exclusive_path("r");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "garbage").unwrap();

        let holder = store.read_exclusive("r").unwrap().unwrap();
        assert!(holder.metadata.is_none());
        assert_eq!(holder.token(), None);
    }

    #[test]
    fn clear_removes_everything_and_lists_resources() {
        let (_tmp, store) = store();
        store
            .try_create_reader_token("docs/a.json", &LockMetadata::new("r1", LockMode::Shared))
            .unwrap();
        store
            .try_create_reader_token("docs/a.json", &LockMetadata::new("r2", LockMode::Shared))
            .unwrap();
        store
            .try_create_exclusive("b", &LockMetadata::new("w", LockMode::Exclusive))
            .unwrap();

        assert_eq!(
            store.resources().unwrap(),
            vec!["b".to_string(), "docs/a.json".to_string()]
        );
        assert_eq!(store.holders("docs/a.json").unwrap().len(), 2);

        assert_eq!(store.clear("docs/a.json").unwrap(), 2);
        assert!(!store.has_any("docs/a.json").unwrap());
        assert!(store.has_any("b").unwrap());
    }

    #[test]
    fn missing_root_means_no_resources() {
        let (_tmp, store) = store();
        assert!(store.resources().unwrap().is_empty());
        assert!(!store.has_any("anything").unwrap());
    }

    #[test]
    fn renew_refreshes_own_marker_only() {
        let (_tmp, store) = store();
        let mut a = LockMetadata::new("a", LockMode::Exclusive);
        a.updated_at = a.updated_at - chrono::Duration::seconds(60);
        store.try_create_exclusive("r", &a).unwrap();

        assert!(!store.renew("r", LockMode::Exclusive, "b").unwrap());
        let before = store.read_exclusive("r").unwrap().unwrap();
        assert_eq!(before.token(), Some("a"));

        assert!(store.renew("r", LockMode::Exclusive, "a").unwrap());
        let after = store.read_exclusive("r").unwrap().unwrap();
        assert!(after.metadata.unwrap().updated_at > a.updated_at);
    }

    #[test]
    fn renew_never_recreates_a_removed_artifact() {
        let (_tmp, store) = store();
        let a = LockMetadata::new("a", LockMode::Exclusive);
        store.try_create_exclusive("r", &a).unwrap();
        store.remove_exclusive("r").unwrap();

        assert!(!store.renew("r", LockMode::Exclusive, "a").unwrap());
        assert!(!store.has_exclusive("r").unwrap());

        let reader = LockMetadata::new("r1", LockMode::Shared);
        store.try_create_reader_token("r", &reader).unwrap();
        store.remove_reader_token("r", "r1").unwrap();
        assert!(!store.renew("r", LockMode::Shared, "r1").unwrap());
        assert!(store.list_reader_tokens("r").unwrap().is_empty());

        assert!(!store.renew("never-used", LockMode::Exclusive, "a").unwrap());
        assert_eq!(store.resources().unwrap(), vec!["r".to_string()]);
    }

    #[test]
    fn conditional_reader_removal_checks_record() {
        let (_tmp, store) = store();
        let reader = LockMetadata::new("r1", LockMode::Shared);
        store.try_create_reader_token("r", &reader).unwrap();

        assert!(!store.remove_reader_token_if("r", "r1", |_| false).unwrap());
        assert!(store.remove_reader_token_if("r", "r1", |m| m.is_some()).unwrap());
        assert!(!store.remove_reader_token_if("r", "r1", |_| true).unwrap());
    }

    #[test]
    fn guarded_removal_waits_for_guard_holder() {
        let (_tmp, store) = store();
        let a = LockMetadata::new("a", LockMode::Exclusive);
        store.try_create_exclusive("r", &a).unwrap();

        let guard = store.guard("r").unwrap().unwrap();
        let remover = {
            let store = store.clone();
            std::thread::spawn(move || store.remove_exclusive_if("r", |_| true).unwrap())
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(store.has_exclusive("r").unwrap());
        assert!(!remover.is_finished());

        drop(guard);
        assert!(remover.join().unwrap());
        assert!(!store.has_exclusive("r").unwrap());
    }

    #[test]
    fn guard_file_is_not_a_holder() {
        let (_tmp, store) = store();
        let reader = LockMetadata::new("r1", LockMode::Shared);
        store.try_create_reader_token("r", &reader).unwrap();
        drop(store.guard("r").unwrap().unwrap());

        assert!(store.namespace("r").join(GUARD_FILE).is_file());
        assert_eq!(store.holders("r").unwrap().len(), 1);
        assert_eq!(store.clear("r").unwrap(), 1);
        assert!(!store.has_any("r").unwrap());
    }
}
