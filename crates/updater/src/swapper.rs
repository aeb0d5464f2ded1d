//! One-shot swapper: replaces an installed executable without a long-lived
//! launcher. The running binary copies itself to a backup, starts that copy
//! detached in swap mode and exits; the copy then overwrites the original and
//! starts it again.

use crate::{
    error::{Result, UpdaterError},
    meta::ApplicationMeta,
    swap::{copy_executable, make_executable, platform_swap},
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{info, warn};

pub const SWAPPING_FLAG: &str = "--swapping";
pub const NEW_VERSION_PATH_FLAG: &str = "--new-version-path";
pub const ORIGINAL_EXECUTABLE_FLAG: &str = "--original-executable-location";
pub const BACKUP_PATH_FLAG: &str = "--original-executable-backup-path";

const INSTALLED_MODE: u32 = 0o755;
const DEFAULT_ATTEMPTS: u32 = 20;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Paths handed to a swapper process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub new_version_path: PathBuf,
    pub original_executable: PathBuf,
    pub backup_path: PathBuf,
    /// How many times to try replacing the original while it is still busy.
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl SwapRequest {
    pub fn new(
        new_version_path: impl Into<PathBuf>,
        original_executable: impl Into<PathBuf>,
        backup_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            new_version_path: new_version_path.into(),
            original_executable: original_executable.into(),
            backup_path: backup_path.into(),
            attempts: DEFAULT_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Build from optional command-line values; every path is required.
    pub fn from_args(
        new_version_path: Option<PathBuf>,
        original_executable: Option<PathBuf>,
        backup_path: Option<PathBuf>,
    ) -> Result<Self> {
        let new_version_path =
            new_version_path.ok_or(UpdaterError::MissingArgument(NEW_VERSION_PATH_FLAG))?;
        let backup_path = backup_path.ok_or(UpdaterError::MissingArgument(BACKUP_PATH_FLAG))?;
        let original_executable =
            original_executable.ok_or(UpdaterError::MissingArgument(ORIGINAL_EXECUTABLE_FLAG))?;
        Ok(Self::new(new_version_path, original_executable, backup_path))
    }

    pub fn with_retry(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }
}

/// `backup.<name>` next to `executable`.
pub fn backup_path_for(executable: &Path) -> Result<PathBuf> {
    let name = executable.file_name().ok_or_else(|| {
        UpdaterError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", executable.display()),
        ))
    })?;
    let mut backup = std::ffi::OsString::from("backup.");
    backup.push(name);
    Ok(executable.with_file_name(backup))
}

/// Copy the running executable to its backup path and start the copy,
/// detached, in swap mode. Returns the backup path.
pub fn launch_swapper(meta: &ApplicationMeta, new_version_path: &Path) -> Result<PathBuf> {
    let original = &meta.executable_path;
    let backup = backup_path_for(original)?;

    if let Err(err) = copy_executable(original, &backup) {
        let _ = fs::remove_file(&backup);
        return Err(err);
    }
    if !meta.is_windows() {
        make_executable(&backup, INSTALLED_MODE)?;
    }

    let mut cmd = Command::new(&backup);
    cmd.arg(SWAPPING_FLAG)
        .arg(NEW_VERSION_PATH_FLAG)
        .arg(new_version_path)
        .arg(ORIGINAL_EXECUTABLE_FLAG)
        .arg(original)
        .arg(BACKUP_PATH_FLAG)
        .arg(&backup);
    spawn_detached(&mut cmd, &backup)?;

    info!(
        target: "updater",
        swapper = %backup.display(),
        new_version = %new_version_path.display(),
        "swapper launched"
    );
    Ok(backup)
}

/// Replace the original executable with the new version and start it again.
///
/// The backup is left in place; nothing is rolled back if the restart fails.
pub async fn run_swapper(request: &SwapRequest) -> Result<()> {
    let original = &request.original_executable;
    // The new version usually sits in the temp dir; copy it next to the
    // original first so the final step is a same-directory rename.
    let staged = staging_path_for(original)?;
    copy_executable(&request.new_version_path, &staged)?;

    let mut attempt = 1;
    loop {
        match platform_swap().replace(&staged, original) {
            Ok(()) => break,
            Err(err) if attempt < request.attempts => {
                warn!(
                    target: "updater",
                    attempt,
                    error = %err,
                    "original executable not replaceable yet; retrying"
                );
                attempt += 1;
                tokio::time::sleep(request.retry_delay).await;
            }
            Err(err) => {
                let _ = fs::remove_file(&staged);
                return Err(err);
            }
        }
    }

    make_executable(original, INSTALLED_MODE)?;
    if let Err(err) = fs::remove_file(&request.new_version_path) {
        warn!(
            target: "updater",
            path = %request.new_version_path.display(),
            error = %err,
            "failed to remove downloaded new version"
        );
    }

    spawn_detached(&mut Command::new(original), original)?;
    info!(
        target: "updater",
        path = %original.display(),
        backup = %request.backup_path.display(),
        "swap complete; original executable restarted"
    );
    Ok(())
}

fn staging_path_for(executable: &Path) -> Result<PathBuf> {
    let backup = backup_path_for(executable)?;
    let mut name = backup
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".swap");
    Ok(backup.with_file_name(name))
}

fn spawn_detached(cmd: &mut Command, path: &Path) -> Result<()> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    detach(cmd);

    cmd.spawn().map(|_| ()).map_err(|source| UpdaterError::Spawn {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    cmd.process_group(0);
}

#[cfg(windows)]
fn detach(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;

    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut Command) {}
