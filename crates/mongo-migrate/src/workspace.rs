//! Per-attempt temporary directory.

use crate::error::{MigrateError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory prefix for workspaces, followed by the attempt id.
pub const WORKSPACE_PREFIX: &str = "mongo-migrate-";

/// Temporary directory owned by exactly one migration attempt.
///
/// The directory is removed by [`Workspace::release`] or, failing that,
/// when the value is dropped.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    /// Create `base/mongo-migrate-<attempt_id>`.
    ///
    /// The final component is created non-recursively, so two attempts can
    /// never end up sharing a directory.
    pub fn acquire(base: &Path, attempt_id: &str) -> Result<Self> {
        if attempt_id.is_empty()
            || attempt_id.contains(|c: char| c == '/' || c == '\\')
            || attempt_id.contains("..")
        {
            return Err(MigrateError::Validation(format!(
                "attempt id {:?} is not usable as a directory name",
                attempt_id
            )));
        }

        std::fs::create_dir_all(base)?;
        let path = base.join(format!("{}{}", WORKSPACE_PREFIX, attempt_id));
        std::fs::create_dir(&path)?;
        debug!("Acquired workspace {:?}", path);

        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the dump tool writes its output.
    pub fn dump_dir(&self) -> PathBuf {
        self.path.join("dump")
    }

    /// Delete the directory tree. A directory that is already gone counts
    /// as released.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_tree(&self.path)?;
        debug!("Released workspace {:?}", self.path);
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = remove_tree(&self.path) {
            warn!("Failed to remove workspace {:?}: {}", self.path, e);
        }
    }
}

fn remove_tree(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
