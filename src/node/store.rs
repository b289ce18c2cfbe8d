//! Node storage engine
//!
//! Blobs live at `{root}/{group_id}/{name}`. Writes go to a uniquely named
//! file under `{root}/.staging/` and are renamed into place, so readers and
//! inventory walks only ever see complete files.

use crate::error::{StoreError, StoreResult};
use crate::key::{ContentKey, STAGING_DIR};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Local hierarchical file store owned by one storage node
#[derive(Debug, Clone)]
pub struct NodeStore {
    root: PathBuf,
}

impl NodeStore {
    /// Open (or create) a store rooted at the given directory
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(STAGING_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &ContentKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Create or overwrite a blob. Concurrent writers of one key: last rename wins.
    pub fn write(&self, key: &ContentKey, data: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let staged = self.staging_path();
        let result = File::create(&staged)
            .and_then(|mut file| {
                file.write_all(data)?;
                file.sync_all()
            })
            .and_then(|()| place(&staged, &path));
        if let Err(e) = result {
            let _ = fs::remove_file(&staged);
            return Err(e.into());
        }

        log::debug!("Stored {} ({} bytes)", key, data.len());
        Ok(())
    }

    /// Read a blob
    pub fn read(&self, key: &ContentKey) -> StoreResult<Vec<u8>> {
        match fs::read(self.path_for(key)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a blob. Deleting an absent blob succeeds.
    ///
    /// The group directory is pruned when this leaves it empty.
    pub fn delete(&self, key: &ContentKey) -> StoreResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("Deleted {}", key),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(parent) = path.parent() {
            // fails while other files remain; that is fine
            let _ = fs::remove_dir(parent);
        }
        Ok(())
    }

    /// Every regular file under the root as `group_id/name`.
    ///
    /// Any walk error fails the whole listing.
    pub fn list(&self) -> StoreResult<Vec<String>> {
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == STAGING_DIR));

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| StoreError::Io(io::Error::other(e)))?;
            files.push(slash_path(relative));
        }

        Ok(files)
    }

    fn staging_path(&self) -> PathBuf {
        let id: [u8; 16] = rand::random();
        self.root.join(STAGING_DIR).join(hex::encode(id))
    }
}

/// Rename a staged file into place. A delete in the same group may prune
/// the parent between its creation and the rename; recreate it once.
fn place(staged: &Path, path: &Path) -> io::Result<()> {
    match fs::rename(staged, path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(staged, path)
        }
        other => other,
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
