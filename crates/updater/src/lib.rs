//! Signed self-update pipeline and supervising launcher.
//!
//! A release authority publishes a JSON manifest together with a detached
//! Ed25519 signature over the manifest's SHA-256 digest. The [`Updater`] job
//! fetches both, verifies the manifest against the key embedded in the
//! binary, picks the artifact for the running platform, checks its digest and
//! signature, and hands the verified temporary file to a continuation.
//!
//! The [`Launcher`] supervises a worker process running from a private
//! session directory. When the worker stages a replacement and exits with
//! [`WorkerExit::UpdateReady`], the launcher swaps the file and restarts it.
//!
//! ```ignore
//! use std::sync::Arc;
//! use updater::{ApplicationMeta, Schedule, Updater, UpdaterConfig};
//!
//! # async fn demo() -> updater::Result<()> {
//! let meta = ApplicationMeta::detect(env!("CARGO_PKG_VERSION"), "unknown")?;
//! let config = UpdaterConfig::from_env()?;
//! let schedule = Schedule::parse(&config.schedule)?;
//! let run_at_boot = config.run_at_boot;
//!
//! let job = Arc::new(Updater::builder(meta, config).build(Arc::new(|staged| {
//!     println!("verified {} at {}", staged.version, staged.file.path().display());
//! })));
//! let handle = schedule.start(run_at_boot, move || {
//!     let job = job.clone();
//!     async move {
//!         job.run().await;
//!     }
//! });
//! # handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod digest;
pub mod error;
pub mod exit_code;
pub mod fetcher;
pub mod launcher;
pub mod manifest;
pub mod meta;
pub mod release;
pub mod schedule;
pub mod session;
pub mod swap;
pub mod swapper;
pub mod updater;

#[cfg(test)]
mod test_support;

pub use audit::{
    encode_public_key_pem, parse_public_key, verify_signature, Ed25519Auditor, SignatureVerifier,
};
pub use config::{LauncherConfig, UpdaterConfig};
pub use digest::{digest_file, Digester, FileDigest, Sha256Digester};
pub use error::{ErrorKind, Result, UpdaterError};
pub use exit_code::WorkerExit;
pub use fetcher::{download_with_timeout, Downloader, HttpDownloader, HttpDownloaderBuilder};
pub use launcher::Launcher;
pub use manifest::{Artifact, ReleaseInfo, ReleaseManifest};
pub use meta::{ApplicationMeta, SourceInfo};
pub use release::{ManifestFetcher, ManifestLocation, SignedManifestFetcher, StaticManifestFetcher};
pub use schedule::{Schedule, ScheduleHandle};
pub use session::SessionDir;
pub use swap::{platform_swap, AtomicRename, RemoveThenRename, SwapStrategy};
pub use swapper::{launch_swapper, run_swapper, SwapRequest};
pub use updater::{OnUpgradeReady, StagedArtifact, UpdateOutcome, Updater, UpdaterBuilder};
