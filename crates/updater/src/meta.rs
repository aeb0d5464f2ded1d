use crate::digest::{self, FileDigest};
use crate::error::Result;
use std::path::PathBuf;

/// Trust root compiled into every binary.
pub const AUTHORS_PUBLIC_KEY_PEM: &[u8] = include_bytes!("../assets/authors_public_key.pem");

/// Release host the manifest is published on.
pub const SOURCE_HOST: &str = "github.com";
/// Account owning the release repository.
pub const SOURCE_OWNER: &str = "danilevy1212";
/// Release repository name.
pub const SOURCE_NAME: &str = "self-updater";

/// Suffix appended to the manifest URL to locate its detached signature.
pub const SIGNATURE_SUFFIX: &str = ".sig.base64";

/// Where releases are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Release host, without scheme.
    pub host: String,
    /// Account owning the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl SourceInfo {
    /// URL of the latest release manifest.
    pub fn manifest_url(&self) -> String {
        format!(
            "https://{}/{}/{}/releases/latest/download/release.json",
            self.host, self.owner, self.name
        )
    }
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self {
            host: SOURCE_HOST.to_string(),
            owner: SOURCE_OWNER.to_string(),
            name: SOURCE_NAME.to_string(),
        }
    }
}

/// Immutable description of the running process, built once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationMeta {
    /// Path of the running executable.
    pub executable_path: PathBuf,
    /// SHA-256 of the running executable.
    pub digest: FileDigest,
    /// Build version, compared against the manifest's `latest`.
    pub version: String,
    /// Build commit.
    pub commit: String,
    /// PEM bytes of the authority key.
    pub authors_public_key: Vec<u8>,
    /// OS tag in release naming.
    pub os: String,
    /// Architecture tag in release naming.
    pub arch: String,
    /// Where releases are fetched from.
    pub source: SourceInfo,
}

impl ApplicationMeta {
    /// Assemble metadata for the current host with the embedded trust root.
    pub fn new(
        digest: FileDigest,
        version: impl Into<String>,
        commit: impl Into<String>,
        executable_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable_path: executable_path.into(),
            digest,
            version: version.into(),
            commit: commit.into(),
            authors_public_key: AUTHORS_PUBLIC_KEY_PEM.to_vec(),
            os: platform_os().to_string(),
            arch: platform_arch().to_string(),
            source: SourceInfo::default(),
        }
    }

    /// Locate and hash the running executable.
    pub fn detect(version: impl Into<String>, commit: impl Into<String>) -> Result<Self> {
        let executable_path = std::env::current_exe()?;
        let digest = digest::digest_file(&executable_path)?;
        Ok(Self::new(digest, version, commit, executable_path))
    }

    /// Lowercase hex of [`Self::digest`].
    pub fn digest_hex(&self) -> String {
        self.digest.to_hex()
    }

    /// The authority key in the string form manifests carry.
    pub fn authors_public_key_str(&self) -> String {
        String::from_utf8_lossy(&self.authors_public_key).into_owned()
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

/// OS tag as used in release manifests.
pub fn platform_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// CPU architecture tag as used in release manifests.
pub fn platform_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}
