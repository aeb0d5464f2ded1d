//! Worker process: serves HTTP while the update job runs on its schedule, and
//! hands a verified update to the launcher (or a one-shot swapper) once
//! serving has stopped.

use anyhow::{Context, Result};
use server::{Application, BuildInfo, ServerConfig};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use updater::{
    launch_swapper, ApplicationMeta, HttpDownloader, OnUpgradeReady, Schedule, SessionDir,
    StagedArtifact, Updater, UpdaterBuilder, UpdaterConfig, WorkerExit,
};

/// Settings the worker reads from the environment.
pub struct WorkerSettings {
    pub updater: UpdaterConfig,
    pub server: ServerConfig,
}

impl WorkerSettings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            updater: UpdaterConfig::from_env()?,
            server: ServerConfig::from_env()?,
        })
    }

    pub fn is_dev(&self) -> bool {
        self.updater.is_dev || self.server.is_dev
    }
}

/// Run under a launcher: a staged update is moved to `new[.exe]` in the
/// session directory and reported with the update-ready exit code.
pub async fn run_supervised(
    meta: ApplicationMeta,
    settings: WorkerSettings,
    session_dir: PathBuf,
) -> WorkerExit {
    let session = SessionDir::open(session_dir, meta.is_windows());
    // Same filesystem as the session, so staging is a plain rename.
    let worker = match Worker::new(meta, settings, Some(session.path())) {
        Ok(worker) => worker.stop_on_interrupt(),
        Err(err) => {
            error!(target: "server", error = ?err, "invalid worker configuration");
            return WorkerExit::Fatal;
        }
    };
    worker.supervise(&session).await
}

/// Run without a launcher: a staged update is handed to a detached swapper
/// that replaces this executable after we exit.
pub async fn run_standalone(meta: ApplicationMeta, settings: WorkerSettings) -> WorkerExit {
    let worker = match Worker::new(meta.clone(), settings, None) {
        Ok(worker) => worker.stop_on_interrupt(),
        Err(err) => {
            error!(target: "server", error = ?err, "invalid worker configuration");
            return WorkerExit::Fatal;
        }
    };

    match worker.serve_until_update().await {
        Ok(None) => WorkerExit::Ok,
        Ok(Some(staged)) => match hand_to_swapper(&meta, staged) {
            Ok(()) => WorkerExit::Ok,
            Err(err) => {
                error!(target: "updater", error = ?err, "failed to launch swapper");
                WorkerExit::Fatal
            }
        },
        Err(err) => {
            error!(target: "server", error = ?err, "worker failed");
            WorkerExit::Fatal
        }
    }
}

fn hand_to_swapper(meta: &ApplicationMeta, staged: StagedArtifact) -> Result<()> {
    let (_file, path) = staged
        .file
        .keep()
        .map_err(|err| err.error)
        .context("keeping verified artifact")?;
    launch_swapper(meta, &path)?;
    Ok(())
}

/// One worker run: the update job, its schedule and the HTTP listener.
struct Worker {
    job: UpdaterBuilder,
    schedule: Schedule,
    run_at_boot: bool,
    server: ServerConfig,
    build_info: BuildInfo,
    shutdown: CancellationToken,
}

impl Worker {
    fn new(
        meta: ApplicationMeta,
        settings: WorkerSettings,
        download_dir: Option<&Path>,
    ) -> Result<Self> {
        let WorkerSettings {
            updater: updater_config,
            server,
        } = settings;

        let mut downloader = HttpDownloader::builder();
        if let Some(dir) = download_dir {
            downloader = downloader.temp_dir(dir);
        }

        let schedule = Schedule::parse(&updater_config.schedule)?;
        let run_at_boot = updater_config.run_at_boot;
        let build_info = BuildInfo {
            version: meta.version.clone(),
            commit: meta.commit.clone(),
            sha256: meta.digest_hex(),
        };
        let job = Updater::builder(meta, updater_config).downloader(Arc::new(downloader.build()));

        Ok(Self {
            job,
            schedule,
            run_at_boot,
            server,
            build_info,
            shutdown: CancellationToken::new(),
        })
    }

    /// Treat Ctrl-C like a shutdown request.
    fn stop_on_interrupt(self) -> Self {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(target: "server", "interrupt received; shutting down");
                shutdown.cancel();
            }
        });
        self
    }

    /// Serve, then stage whatever update arrived into `session`.
    async fn supervise(self, session: &SessionDir) -> WorkerExit {
        match self.serve_until_update().await {
            Ok(None) => WorkerExit::Ok,
            Ok(Some(staged)) => {
                let version = staged.version.clone();
                match session.stage(staged) {
                    Ok(path) => {
                        info!(
                            target: "updater",
                            %version,
                            path = %path.display(),
                            "update staged; exiting for swap"
                        );
                        WorkerExit::UpdateReady
                    }
                    Err(err) => {
                        error!(target: "updater", error = %err, "failed to stage update");
                        WorkerExit::Fatal
                    }
                }
            }
            Err(err) => {
                error!(target: "server", error = ?err, "worker failed");
                WorkerExit::Fatal
            }
        }
    }

    /// Serve until a verified update arrives or shutdown is requested.
    /// Returns the update, if any, after the server has stopped.
    async fn serve_until_update(self) -> Result<Option<StagedArtifact>> {
        let Self {
            job,
            schedule,
            run_at_boot,
            server,
            build_info,
            shutdown,
        } = self;

        let slot: Arc<Mutex<Option<StagedArtifact>>> = Arc::new(Mutex::new(None));
        let on_ready: OnUpgradeReady = {
            let slot = slot.clone();
            let shutdown = shutdown.clone();
            Arc::new(move |staged| {
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(staged);
                shutdown.cancel();
            })
        };

        let job = Arc::new(job.build(on_ready));
        let app = Application::bind(&server, build_info).await?;

        let scheduler = {
            let shutdown = shutdown.clone();
            schedule.start(run_at_boot, move || {
                let job = job.clone();
                let shutdown = shutdown.clone();
                async move {
                    if !shutdown.is_cancelled() {
                        job.run().await;
                    }
                }
            })
        };

        let served = app.serve(shutdown).await;
        scheduler.shutdown().await;
        served?;

        let staged = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(staged)
    }
}
