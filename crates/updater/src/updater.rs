use crate::{
    audit::{Ed25519Auditor, SignatureVerifier},
    config::UpdaterConfig,
    digest::{Digester, FileDigest, Sha256Digester},
    error::{Result, UpdaterError},
    fetcher::{download_with_timeout, Downloader, HttpDownloader},
    meta::ApplicationMeta,
    release::{ManifestFetcher, ManifestLocation, SignedManifestFetcher},
};
use std::fmt;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A downloaded artifact that passed digest and signature checks.
///
/// Dropping it without persisting the file deletes the file.
pub struct StagedArtifact {
    /// Release version the artifact belongs to.
    pub version: String,
    /// Open handle to the verified temporary file.
    pub file: NamedTempFile,
}

impl fmt::Debug for StagedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedArtifact")
            .field("version", &self.version)
            .field("path", &self.file.path())
            .finish()
    }
}

/// Continuation invoked with ownership of a verified artifact.
pub type OnUpgradeReady = Arc<dyn Fn(StagedArtifact) + Send + Sync>;

/// Result of a single update check.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The running version is the latest one.
    UpToDate,
    /// A verified artifact was handed to the continuation.
    Staged {
        /// Version that was staged.
        version: String,
    },
    /// The check stopped at a failing step; the next tick retries.
    Failed(UpdaterError),
}

/// Builder for [`Updater`].
pub struct UpdaterBuilder {
    meta: ApplicationMeta,
    config: UpdaterConfig,
    manifest_fetcher: Option<Arc<dyn ManifestFetcher>>,
    downloader: Option<Arc<dyn Downloader>>,
    digester: Option<Arc<dyn Digester>>,
    verifier: Option<Arc<dyn SignatureVerifier>>,
}

impl UpdaterBuilder {
    /// Replace the manifest source.
    pub fn manifest_fetcher(mut self, fetcher: Arc<dyn ManifestFetcher>) -> Self {
        self.manifest_fetcher = Some(fetcher);
        self
    }

    /// Replace the downloader used for manifests and artifacts.
    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn digester(mut self, digester: Arc<dyn Digester>) -> Self {
        self.digester = Some(digester);
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Build the job; unset capabilities get their production defaults.
    pub fn build(self, on_upgrade_ready: OnUpgradeReady) -> Updater {
        let downloader = self
            .downloader
            .unwrap_or_else(|| Arc::new(HttpDownloader::default()));
        let digester = self.digester.unwrap_or_else(|| Arc::new(Sha256Digester));
        let verifier = self.verifier.unwrap_or_else(|| Arc::new(Ed25519Auditor));

        let manifest_fetcher = self.manifest_fetcher.unwrap_or_else(|| {
            let location = match &self.config.manifest_url {
                Some(url) => ManifestLocation::new(url.clone()),
                None => ManifestLocation::for_meta(&self.meta),
            };
            Arc::new(SignedManifestFetcher::new(
                location,
                self.meta.authors_public_key.clone(),
                downloader.clone(),
                digester.clone(),
                verifier.clone(),
                self.config.manifest_timeout,
            ))
        });

        Updater {
            meta: self.meta,
            config: self.config,
            manifest_fetcher,
            downloader,
            digester,
            verifier,
            on_upgrade_ready,
        }
    }
}

/// The scheduled update decision job.
pub struct Updater {
    meta: ApplicationMeta,
    config: UpdaterConfig,
    manifest_fetcher: Arc<dyn ManifestFetcher>,
    downloader: Arc<dyn Downloader>,
    digester: Arc<dyn Digester>,
    verifier: Arc<dyn SignatureVerifier>,
    on_upgrade_ready: OnUpgradeReady,
}

impl Updater {
    /// Start configuring a job for the given process metadata.
    pub fn builder(meta: ApplicationMeta, config: UpdaterConfig) -> UpdaterBuilder {
        UpdaterBuilder {
            meta,
            config,
            manifest_fetcher: None,
            downloader: None,
            digester: None,
            verifier: None,
        }
    }

    /// Run one check. Errors are logged and reported in the outcome; they
    /// never escape the invocation.
    pub async fn run(&self) -> UpdateOutcome {
        info!(
            target: "updater",
            version = %self.meta.version,
            commit = %self.meta.commit,
            digest = %self.meta.digest_hex(),
            "running updater job"
        );

        match self.check().await {
            Ok(None) => UpdateOutcome::UpToDate,
            Ok(Some(staged)) => {
                let version = staged.version.clone();
                info!(
                    target: "updater",
                    version = %version,
                    path = %staged.file.path().display(),
                    "downloaded artifact file verified; handing over"
                );
                (self.on_upgrade_ready)(staged);
                UpdateOutcome::Staged { version }
            }
            Err(err) => {
                error!(
                    target: "updater",
                    error = %err,
                    kind = ?err.kind(),
                    "update check failed"
                );
                UpdateOutcome::Failed(err)
            }
        }
    }

    /// Steps 1-8 of the decision: `Ok(None)` means nothing to do.
    async fn check(&self) -> Result<Option<StagedArtifact>> {
        let manifest = self.manifest_fetcher.fetch_manifest().await?;

        if !manifest.is_signed_by(&self.meta.authors_public_key_str()) {
            return Err(UpdaterError::PublicKeyMismatch);
        }

        if self.meta.version == manifest.latest {
            info!(
                target: "updater",
                version = %self.meta.version,
                "no updates available; current version is up to date"
            );
            return Ok(None);
        }

        let release = manifest.version_info(&manifest.latest)?;
        let artifact = release.artifact_for_platform(&self.meta.os, &self.meta.arch)?;

        info!(
            target: "updater",
            current = %self.meta.version,
            latest = %manifest.latest,
            url = %artifact.url,
            "update available; downloading artifact"
        );

        let file = download_with_timeout(
            self.downloader.as_ref(),
            &artifact.url,
            "artifact.",
            self.config.artifact_timeout,
            &CancellationToken::new(),
        )
        .await?;

        // From here on, returning early drops `file`, which deletes it.
        let digest = self.digest_in_background(&file).await?;
        let actual = digest.to_hex();
        if actual != artifact.digest {
            return Err(UpdaterError::IntegrityMismatch {
                expected: artifact.digest.clone(),
                actual,
            });
        }

        let verified = self.verifier.verify(
            &self.meta.authors_public_key,
            &actual,
            &artifact.signature_base64,
        )?;
        if !verified {
            return Err(UpdaterError::ArtifactSignatureInvalid);
        }

        Ok(Some(StagedArtifact {
            version: release.version.clone(),
            file,
        }))
    }

    async fn digest_in_background(&self, file: &NamedTempFile) -> Result<FileDigest> {
        let digester = self.digester.clone();
        let path = file.path().to_path_buf();
        task::spawn_blocking(move || digester.digest_file(&path))
            .await
            .map_err(|err| UpdaterError::Io(std::io::Error::other(err)))?
    }
}
