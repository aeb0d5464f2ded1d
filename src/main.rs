mod telemetry;
mod worker;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use updater::{
    run_swapper, ApplicationMeta, Launcher, LauncherConfig, SwapRequest, UpdaterConfig, WorkerExit,
};
use worker::WorkerSettings;

const VERSION: &str = match option_env!("SELF_UPDATER_VERSION") {
    Some(version) => version,
    None => concat!("v", env!("CARGO_PKG_VERSION")),
};
const COMMIT: &str = match option_env!("SELF_UPDATER_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

/// Self-updating service. Without flags it acts as the launcher that
/// supervises a worker copy of itself.
#[derive(Parser, Debug)]
#[clap(version, about = "Self-updating service with signed releases")]
struct Args {
    /// Run as the supervised worker
    #[clap(long)]
    server: bool,

    /// Session directory shared with the launcher
    #[clap(long, value_name = "DIR")]
    current_session_dir: Option<PathBuf>,

    /// Run the worker without a launcher; updates go through a one-shot swapper
    #[clap(long, conflicts_with_all = ["server", "swapping"])]
    standalone: bool,

    /// Run the swap step instead of the service
    #[clap(long, conflicts_with = "server")]
    swapping: bool,

    /// New version to install (swap mode)
    #[clap(long, value_name = "PATH")]
    new_version_path: Option<PathBuf>,

    /// Executable to replace (swap mode)
    #[clap(long, value_name = "PATH")]
    original_executable_location: Option<PathBuf>,

    /// Backup copy running the swap (swap mode)
    #[clap(long, value_name = "PATH")]
    original_executable_backup_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    if args.swapping {
        return swap(args).await;
    }
    if args.server || args.standalone {
        return serve(args).await;
    }
    launch().await
}

async fn launch() -> ExitCode {
    let config = LauncherConfig::from_env();
    telemetry::init(config.as_ref().is_ok_and(|c| c.is_dev));

    let result = async {
        let config = config?;
        let meta = ApplicationMeta::detect(VERSION, COMMIT)?;
        info!(
            target: "launcher",
            version = %meta.version,
            commit = %meta.commit,
            digest = %meta.digest_hex(),
            "starting launcher"
        );
        Launcher::new(&meta, &config)?.run().await
    }
    .await;

    match result {
        Ok(never) => match never {},
        Err(err) => {
            error!(target: "launcher", error = %err, kind = ?err.kind(), "launcher stopped");
            WorkerExit::Fatal.into()
        }
    }
}

async fn serve(args: Args) -> ExitCode {
    let settings = WorkerSettings::from_env();
    telemetry::init(settings.as_ref().is_ok_and(WorkerSettings::is_dev));

    let settings = match settings {
        Ok(settings) => settings,
        Err(err) => {
            error!(target: "server", error = %err, "invalid worker configuration");
            return WorkerExit::Fatal.into();
        }
    };
    let meta = match ApplicationMeta::detect(VERSION, COMMIT) {
        Ok(meta) => meta,
        Err(err) => {
            error!(target: "server", error = %err, "failed to identify running executable");
            return WorkerExit::Fatal.into();
        }
    };

    let exit = match args.current_session_dir {
        Some(session_dir) if args.server => {
            worker::run_supervised(meta, settings, session_dir).await
        }
        _ if args.server => {
            error!(target: "server", "--server requires --current-session-dir");
            WorkerExit::Fatal
        }
        _ => worker::run_standalone(meta, settings).await,
    };
    info!(target: "server", exit_code = exit.code(), "worker exiting");
    exit.into()
}

async fn swap(args: Args) -> ExitCode {
    let is_dev = UpdaterConfig::from_env().is_ok_and(|c| c.is_dev);
    telemetry::init(is_dev);

    let request = match SwapRequest::from_args(
        args.new_version_path,
        args.original_executable_location,
        args.original_executable_backup_path,
    ) {
        Ok(request) => request,
        Err(err) => {
            error!(target: "updater", error = %err, "invalid swap invocation");
            return WorkerExit::Fatal.into();
        }
    };

    match run_swapper(&request).await {
        Ok(()) => WorkerExit::Ok.into(),
        Err(err) => {
            error!(target: "updater", error = %err, kind = ?err.kind(), "error swapping versions");
            WorkerExit::Fatal.into()
        }
    }
}
