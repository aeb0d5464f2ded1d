//! Replacing an executable on disk with a staged one.

use crate::error::{Result, UpdaterError};
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

/// Moves a staged file onto the path of the executable it replaces.
pub trait SwapStrategy: Debug + Send + Sync {
    fn replace(&self, staged: &Path, current: &Path) -> Result<()>;
}

/// POSIX: `rename(2)` atomically replaces the target even while it is running.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicRename;

impl SwapStrategy for AtomicRename {
    fn replace(&self, staged: &Path, current: &Path) -> Result<()> {
        rename(staged, current)
    }
}

/// Windows cannot rename over an existing executable image, so the old file
/// is removed first. Between the two steps no `current` exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveThenRename;

impl SwapStrategy for RemoveThenRename {
    fn replace(&self, staged: &Path, current: &Path) -> Result<()> {
        match fs::remove_file(current) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                target: "launcher",
                path = %current.display(),
                error = %err,
                "failed to remove current executable before swap"
            ),
        }
        rename(staged, current)
    }
}

/// The strategy for the platform this binary was built for.
pub fn platform_swap() -> &'static dyn SwapStrategy {
    #[cfg(windows)]
    {
        &RemoveThenRename
    }
    #[cfg(not(windows))]
    {
        &AtomicRename
    }
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|source| UpdaterError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

/// Copy an executable, keeping nothing but its bytes and mode.
pub fn copy_executable(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|source| UpdaterError::CopyFile {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
}

/// Set the permission bits of `path` to `mode`. No-op where the platform has
/// no such bits.
#[cfg(unix)]
pub fn make_executable(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|source| {
        UpdaterError::Permissions {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
pub fn make_executable(path: &Path, _mode: u32) -> Result<()> {
    fs::metadata(path)
        .map(|_| ())
        .map_err(|source| UpdaterError::Permissions {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged_pair(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let staged = dir.join("new");
        let current = dir.join("current");
        fs::write(&staged, b"v2").unwrap();
        fs::write(&current, b"v1").unwrap();
        (staged, current)
    }

    #[test]
    fn atomic_rename_replaces_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let (staged, current) = staged_pair(dir.path());

        AtomicRename.replace(&staged, &current).unwrap();

        assert_eq!(fs::read(&current).unwrap(), b"v2");
        assert!(!staged.exists());
    }

    #[test]
    fn remove_then_rename_replaces_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let (staged, current) = staged_pair(dir.path());

        RemoveThenRename.replace(&staged, &current).unwrap();

        assert_eq!(fs::read(&current).unwrap(), b"v2");
        assert!(!staged.exists());
    }

    #[test]
    fn remove_then_rename_tolerates_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("new");
        let current = dir.path().join("current");
        fs::write(&staged, b"v2").unwrap();

        RemoveThenRename.replace(&staged, &current).unwrap();
        assert_eq!(fs::read(&current).unwrap(), b"v2");
    }

    #[test]
    fn missing_staged_file_is_a_rename_error() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("current");
        fs::write(&current, b"v1").unwrap();

        let err = platform_swap()
            .replace(&dir.path().join("new"), &current)
            .unwrap_err();
        assert!(matches!(err, UpdaterError::Rename { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn sets_requested_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin");
        fs::write(&path, b"#!/bin/sh\n").unwrap();

        make_executable(&path, 0o700).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn copy_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        fs::write(&from, b"payload").unwrap();

        copy_executable(&from, &to).unwrap();
        assert_eq!(fs::read(&to).unwrap(), b"payload");
        assert!(from.exists());

        let err = copy_executable(&dir.path().join("missing"), &to).unwrap_err();
        assert!(matches!(err, UpdaterError::CopyFile { .. }));
    }
}
