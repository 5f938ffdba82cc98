//! Record name validation and lock resource naming.

use crate::error::{Result, WardenError};
use std::path::{Component, Path, PathBuf};

/// Validate a record name and return its normalized form.
///
/// Names are relative paths with `/` separators. Empty names, absolute
/// paths, and `..` components are rejected; `.` components are dropped.
pub fn normalize_name(name: &str) -> Result<String> {
    let mut parts = Vec::new();

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    WardenError::UserError(format!("record name '{}' is not valid UTF-8", name))
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(WardenError::UserError(format!(
                    "record name '{}' must not contain '..'",
                    name
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(WardenError::UserError(format!(
                    "record name '{}' must be a relative path",
                    name
                )));
            }
        }
    }

    if parts.is_empty() {
        return Err(WardenError::UserError(
            "record name must not be empty".to_string(),
        ));
    }

    Ok(parts.join("/"))
}

/// A validated record: where it lives and which lock guards it.
#[derive(Debug, Clone)]
pub struct RecordPath {
    /// Absolute path of the record file.
    pub path: PathBuf,

    /// Lock resource name: the record's path relative to the state directory.
    pub resource: String,
}

impl RecordPath {
    pub(crate) fn new(base: &Path, prefix: &str, name: &str) -> Result<Self> {
        let name = normalize_name(name)?;
        let resource = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };
        Ok(Self {
            path: base.join(&name),
            resource,
        })
    }
}
