//! Content keys
//!
//! A stored blob is addressed by `(group_id, name)`. The pair is hashed and
//! listed in its `group_id/name` form and lands at the same relative path
//! under a node's storage root.

use crate::error::{StoreError, StoreResult};
use std::fmt;
use std::path::PathBuf;

/// Directory under a storage root reserved for in-flight writes
pub const STAGING_DIR: &str = ".staging";

/// Identifies one stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey {
    group_id: String,
    name: String,
}

impl ContentKey {
    pub fn new(group_id: impl Into<String>, name: impl Into<String>) -> StoreResult<Self> {
        let group_id = group_id.into();
        let name = name.into();
        validate_component("group id", &group_id)?;
        validate_component("file name", &name)?;
        if group_id == STAGING_DIR {
            return Err(StoreError::InvalidKey(format!(
                "group id {:?} is reserved",
                group_id
            )));
        }
        Ok(Self { group_id, name })
    }

    /// Parse the `group_id/name` form returned by a node inventory
    pub fn parse(path: &str) -> StoreResult<Self> {
        match path.split_once('/') {
            Some((group_id, name)) => Self::new(group_id, name),
            None => Err(StoreError::InvalidKey(format!(
                "expected group/name, got {:?}",
                path
            ))),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path relative to a storage root
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.group_id).join(&self.name)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_id, self.name)
    }
}

fn validate_component(what: &str, value: &str) -> StoreResult<()> {
    if value.is_empty() {
        return Err(StoreError::InvalidKey(format!("{} is empty", what)));
    }
    if value == "." || value == ".." {
        return Err(StoreError::InvalidKey(format!("{} {:?} is not allowed", what, value)));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidKey(format!(
            "{} {:?} contains a path separator",
            what, value
        )));
    }
    Ok(())
}
