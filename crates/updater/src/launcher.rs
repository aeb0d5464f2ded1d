//! Supervising launcher: runs the worker from the session directory and swaps
//! in staged replacements whenever the worker exits with the update-ready code.

use crate::{
    config::LauncherConfig,
    error::{Result, UpdaterError},
    exit_code::WorkerExit,
    meta::ApplicationMeta,
    session::SessionDir,
    swap::{copy_executable, make_executable, platform_swap, SwapStrategy},
};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::{error, info};

/// Flag that puts the binary into supervised worker mode.
pub const SERVER_FLAG: &str = "--server";
/// Flag carrying the session directory to the worker.
pub const SESSION_DIR_FLAG: &str = "--current-session-dir";

/// Mode bits applied to executables inside the session directory.
const SESSION_EXECUTABLE_MODE: u32 = 0o700;

pub struct Launcher {
    source_executable: PathBuf,
    session: SessionDir,
    swap: &'static dyn SwapStrategy,
}

impl Launcher {
    /// Create the session directory for this launcher's lifetime.
    pub fn new(meta: &ApplicationMeta, config: &LauncherConfig) -> Result<Self> {
        let session = SessionDir::create(&config.session_root, meta.is_windows())?;
        info!(
            target: "launcher",
            session = %session.path().display(),
            "session directory created"
        );
        Ok(Self::with_session(meta.executable_path.clone(), session))
    }

    /// Supervise `source_executable` inside an already created session.
    pub fn with_session(source_executable: impl Into<PathBuf>, session: SessionDir) -> Self {
        Self {
            source_executable: source_executable.into(),
            session,
            swap: platform_swap(),
        }
    }

    pub fn with_swap_strategy(mut self, swap: &'static dyn SwapStrategy) -> Self {
        self.swap = swap;
        self
    }

    pub fn session(&self) -> &SessionDir {
        &self.session
    }

    /// Run the supervision loop. It only ends with the error that stopped it:
    /// any worker exit other than update-ready, a missing staged binary, or a
    /// failed copy, swap or spawn.
    pub async fn run(&self) -> Result<Infallible> {
        let current = self.session.current_path();
        copy_executable(&self.source_executable, &current)
            .and_then(|()| make_executable(&current, SESSION_EXECUTABLE_MODE))
            .inspect_err(|err| {
                error!(
                    target: "launcher",
                    path = %current.display(),
                    error = %err,
                    "failed to copy executable into session directory"
                )
            })?;

        loop {
            let status = self.run_worker(&current).await?;

            if WorkerExit::from_status(status) != Some(WorkerExit::UpdateReady) {
                error!(
                    target: "launcher",
                    exit_code = ?status.code(),
                    "worker exited without signalling a staged update; stopping"
                );
                return Err(UpdaterError::UnexpectedExit {
                    code: status.code(),
                });
            }

            self.swap_staged(&current).inspect_err(|err| {
                error!(target: "launcher", error = %err, "swap failed; stopping")
            })?;
        }
    }

    async fn run_worker(&self, path: &Path) -> Result<ExitStatus> {
        let mut child = self.spawn_worker(path).inspect_err(|err| {
            error!(target: "launcher", error = %err, "failed to start worker process")
        })?;

        info!(target: "launcher", "waiting for worker to signal update ready");
        Ok(child.wait().await?)
    }

    fn spawn_worker(&self, path: &Path) -> Result<Child> {
        let mut cmd = Command::new(path);
        cmd.arg(SERVER_FLAG)
            .arg(SESSION_DIR_FLAG)
            .arg(self.session.path())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(false);

        let child = cmd.spawn().map_err(|source| UpdaterError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            target: "launcher",
            path = %path.display(),
            session = %self.session.path().display(),
            pid = ?child.id(),
            "worker process started"
        );
        Ok(child)
    }

    fn swap_staged(&self, current: &Path) -> Result<()> {
        let staged = self.session.new_path();
        if !staged.exists() {
            return Err(UpdaterError::StagedBinaryMissing(staged));
        }

        make_executable(&staged, SESSION_EXECUTABLE_MODE)?;
        self.swap.replace(&staged, current)?;

        info!(
            target: "launcher",
            strategy = ?self.swap,
            path = %current.display(),
            "staged binary swapped into place"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::RemoveThenRename;
    use std::fs;

    fn launcher_in(dir: &Path) -> Launcher {
        let session = SessionDir::create(&dir.join("sessions"), false).unwrap();
        Launcher::with_session(dir.join("missing-binary"), session)
    }

    #[tokio::test]
    async fn missing_source_binary_stops_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher_in(dir.path());

        let err = launcher.run().await.unwrap_err();
        assert!(matches!(err, UpdaterError::CopyFile { .. }));
    }

    #[test]
    fn swap_requires_staged_binary() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher_in(dir.path());
        let current = launcher.session().current_path();
        fs::write(&current, b"v1").unwrap();

        let err = launcher.swap_staged(&current).unwrap_err();
        let staged = launcher.session().new_path();
        assert!(matches!(err, UpdaterError::StagedBinaryMissing(ref p) if p == &staged));
        assert_eq!(fs::read(&current).unwrap(), b"v1");
    }

    #[test]
    fn swap_moves_staged_over_current() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher_in(dir.path()).with_swap_strategy(&RemoveThenRename);
        let current = launcher.session().current_path();
        fs::write(&current, b"v1").unwrap();
        fs::write(launcher.session().new_path(), b"v2").unwrap();

        launcher.swap_staged(&current).unwrap();

        assert_eq!(fs::read(&current).unwrap(), b"v2");
        assert!(!launcher.session().new_path().exists());
    }
}
