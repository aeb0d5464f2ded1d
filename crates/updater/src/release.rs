//! Retrieval of the signed release manifest.

use crate::audit::SignatureVerifier;
use crate::digest::Digester;
use crate::error::{Result, UpdaterError};
use crate::fetcher::{download_with_timeout, Downloader};
use crate::manifest::ReleaseManifest;
use crate::meta::{ApplicationMeta, SIGNATURE_SUFFIX};
use async_trait::async_trait;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Source of verified release manifests.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch_manifest(&self) -> Result<ReleaseManifest>;
}

/// Manifest URL and the URL of its detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLocation {
    pub manifest_url: String,
    pub signature_url: String,
}

impl ManifestLocation {
    /// The signature always lives next to the manifest.
    pub fn new(manifest_url: impl Into<String>) -> Self {
        let manifest_url = manifest_url.into();
        let signature_url = format!("{manifest_url}{SIGNATURE_SUFFIX}");
        Self {
            manifest_url,
            signature_url,
        }
    }

    pub fn for_meta(meta: &ApplicationMeta) -> Self {
        Self::new(meta.source.manifest_url())
    }
}

/// Downloads manifest and signature in parallel, verifies, then decodes.
pub struct SignedManifestFetcher {
    location: ManifestLocation,
    authors_public_key: Vec<u8>,
    downloader: Arc<dyn Downloader>,
    digester: Arc<dyn Digester>,
    verifier: Arc<dyn SignatureVerifier>,
    timeout: Duration,
}

impl SignedManifestFetcher {
    /// `authors_public_key` is the PEM trust root the detached signature must
    /// verify against; `timeout` bounds each of the two downloads separately.
    pub fn new(
        location: ManifestLocation,
        authors_public_key: Vec<u8>,
        downloader: Arc<dyn Downloader>,
        digester: Arc<dyn Digester>,
        verifier: Arc<dyn SignatureVerifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            location,
            authors_public_key,
            downloader,
            digester,
            verifier,
            timeout,
        }
    }

    /// Fetch both files under one cancellation scope. The first failure
    /// cancels the other download; both futures always run to completion
    /// before this returns.
    async fn download_pair(&self) -> Result<(NamedTempFile, NamedTempFile)> {
        let cancel = CancellationToken::new();

        let (manifest, signature) = tokio::join!(
            self.download_one(&self.location.manifest_url, "release.json.", &cancel),
            self.download_one(&self.location.signature_url, "release.json.sig.base64.", &cancel),
        );

        match (manifest, signature) {
            (Ok(manifest), Ok(signature)) => Ok((manifest, signature)),
            (manifest, signature) => {
                let mut failures = Vec::new();
                if let Err(err) = &manifest {
                    error!(target: "updater", error = %err, "failed to download manifest file");
                    failures.push(format!("manifest: {err}"));
                }
                if let Err(err) = &signature {
                    error!(
                        target: "updater",
                        error = %err,
                        "failed to download manifest signature file"
                    );
                    failures.push(format!("signature: {err}"));
                }
                // Any half that did arrive is dropped here, deleting its file.
                Err(UpdaterError::ManifestDownload { failures })
            }
        }
    }

    async fn download_one(
        &self,
        url: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<NamedTempFile> {
        let downloader = self.downloader.as_ref();
        let result = download_with_timeout(downloader, url, prefix, self.timeout, cancel).await;
        if result.is_err() {
            cancel.cancel();
        }
        result
    }
}

#[async_trait]
impl ManifestFetcher for SignedManifestFetcher {
    async fn fetch_manifest(&self) -> Result<ReleaseManifest> {
        info!(
            target: "updater",
            manifest_url = %self.location.manifest_url,
            signature_url = %self.location.signature_url,
            "fetching release manifest"
        );

        let (mut manifest_file, mut signature_file) = self.download_pair().await?;

        let mut signature = String::new();
        signature_file.read_to_string(&mut signature)?;

        let digest = self.digester.digest_file(manifest_file.path())?;

        let verified = self
            .verifier
            .verify(&self.authors_public_key, &digest.to_hex(), &signature)
            .inspect_err(|err| {
                error!(target: "updater", error = %err, "failed to verify manifest signature");
            })?;
        if !verified {
            error!(
                target: "updater",
                "manifest signature verification failed; fetched manifest did not come from authors"
            );
            return Err(UpdaterError::ManifestSignatureInvalid);
        }

        let mut body = Vec::new();
        manifest_file.read_to_end(&mut body)?;
        let manifest = ReleaseManifest::from_slice(&body).inspect_err(|err| {
            error!(target: "updater", error = %err, "failed to decode verified manifest");
        })?;

        info!(
            target: "updater",
            latest = %manifest.latest,
            releases = manifest.versions.len(),
            "verified release manifest"
        );
        Ok(manifest)
    }
}

/// Serves a fixed, already trusted manifest. Useful offline and in tests.
#[derive(Debug, Clone)]
pub struct StaticManifestFetcher {
    manifest: ReleaseManifest,
}

impl StaticManifestFetcher {
    /// Serve `manifest` on every call.
    pub fn new(manifest: ReleaseManifest) -> Self {
        Self { manifest }
    }
}

#[async_trait]
impl ManifestFetcher for StaticManifestFetcher {
    async fn fetch_manifest(&self) -> Result<ReleaseManifest> {
        Ok(self.manifest.clone())
    }
}
