//! Per-launcher session directory holding the live and staged executables.

use crate::error::{Result, UpdaterError};
use crate::updater::StagedArtifact;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Name of the file the worker runs from.
pub fn current_file_name(windows: bool) -> &'static str {
    if windows {
        "current.exe"
    } else {
        "current"
    }
}

/// Name of the staged replacement.
pub fn new_file_name(windows: bool) -> &'static str {
    if windows {
        "new.exe"
    } else {
        "new"
    }
}

/// A `<root>/<random-id>` directory owned by one launcher.
///
/// Nothing removes it; cleanup is left to the operator or the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDir {
    path: PathBuf,
    windows: bool,
}

impl SessionDir {
    /// Create a fresh, uniquely named session under `root`.
    pub fn create(root: &Path, windows: bool) -> Result<Self> {
        fs::create_dir_all(root).map_err(|source| UpdaterError::SessionCreate {
            path: root.to_path_buf(),
            source,
        })?;

        let path = root.join(Uuid::new_v4().to_string());
        create_private_dir(&path).map_err(|source| UpdaterError::SessionCreate {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, windows })
    }

    /// Refer to an existing session, as the worker does with the path it was
    /// handed on the command line.
    pub fn open(path: impl Into<PathBuf>, windows: bool) -> Self {
        Self {
            path: path.into(),
            windows,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_path(&self) -> PathBuf {
        self.path.join(current_file_name(self.windows))
    }

    pub fn new_path(&self) -> PathBuf {
        self.path.join(new_file_name(self.windows))
    }

    /// Move a verified artifact into place as `new[.exe]`.
    ///
    /// The temporary file must live on the same filesystem as the session;
    /// the worker downloads straight into the session directory for that.
    pub fn stage(&self, artifact: StagedArtifact) -> Result<PathBuf> {
        let target = self.new_path();
        let from = artifact.file.path().to_path_buf();
        artifact
            .file
            .persist(&target)
            .map_err(|err| UpdaterError::Rename {
                from,
                to: target.clone(),
                source: err.error,
            })?;
        Ok(target)
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new().mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::DirBuilder::new().create(path)
}
