use crate::error::{Result, UpdaterError};
use serde::{Deserialize, Serialize};

/// The authority's view of every published release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseManifest {
    /// Version string of the newest release.
    pub latest: String,
    /// PEM public key the manifest claims to be signed with.
    pub public_key: String,
    /// Every release still offered, newest first by convention.
    pub versions: Vec<ReleaseInfo>,
}

/// A single published release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Version string, compared verbatim against `latest`.
    pub version: String,
    /// Source commit the release was built from.
    pub commit: String,
    /// One build per supported platform.
    pub artifacts: Vec<Artifact>,
}

/// One platform build of a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// OS tag (`linux`, `darwin`, `windows`).
    pub os: String,
    /// Architecture tag (`amd64`, `arm64`, `386`).
    pub arch: String,
    /// Published file name of the binary.
    pub filename: String,
    /// Expected SHA-256 digest, hex encoded.
    pub digest: String,
    /// Base64 Ed25519 signature over the raw digest bytes.
    pub signature_base64: String,
    /// Download location of the binary.
    pub url: String,
}

impl ReleaseManifest {
    /// Decode a manifest body. Callers must verify the body's signature first.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Find the release entry for `version`.
    pub fn version_info(&self, version: &str) -> Result<&ReleaseInfo> {
        self.versions
            .iter()
            .find(|info| info.version == version)
            .ok_or_else(|| UpdaterError::VersionNotFound(version.to_string()))
    }

    /// Whether the manifest names the same trust root as `public_key_pem`.
    /// The PEM text must match byte for byte.
    pub fn is_signed_by(&self, public_key_pem: &str) -> bool {
        self.public_key == public_key_pem
    }
}

impl ReleaseInfo {
    /// Exact-match lookup; there is no fallback to a compatible platform.
    pub fn artifact_for_platform(&self, os: &str, arch: &str) -> Result<&Artifact> {
        self.artifacts
            .iter()
            .find(|artifact| artifact.os == os && artifact.arch == arch)
            .ok_or_else(|| UpdaterError::ArtifactNotFound {
                os: os.to_string(),
                arch: arch.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE_JSON: &str = r#"{
        "latest": "v1.2.3",
        "publicKey": "-----BEGIN PUBLIC KEY-----\nMCowBQYDK2VwAyEAzPWlIg93ORCTYUp1FCIjAA8WZEdyAbXHjBnWOFi9orY=\n-----END PUBLIC KEY-----\n",
        "versions": [
            {
                "version": "v1.2.3",
                "commit": "9f1c2ab",
                "artifacts": [
                    {"os": "linux", "arch": "amd64", "filename": "self-updater-linux-amd64", "digest": "aa", "signatureBase64": "c2ln", "url": "https://example.com/linux-amd64"},
                    {"os": "darwin", "arch": "arm64", "filename": "self-updater-darwin-arm64", "digest": "bb", "signatureBase64": "c2ln", "url": "https://example.com/darwin-arm64"},
                    {"os": "windows", "arch": "amd64", "filename": "self-updater-windows-amd64.exe", "digest": "cc", "signatureBase64": "c2ln", "url": "https://example.com/windows-amd64"}
                ]
            },
            {"version": "v1.2.2", "commit": "41be0d3", "artifacts": []}
        ]
    }"#;

    #[test]
    fn parses_release_document() {
        let manifest = ReleaseManifest::from_slice(RELEASE_JSON.as_bytes()).unwrap();
        assert_eq!(manifest.latest, "v1.2.3");
        assert_eq!(manifest.versions.len(), 2);

        let latest = manifest.version_info("v1.2.3").unwrap();
        assert_eq!(latest.artifacts.len(), 3);
        for artifact in &latest.artifacts {
            assert!(!artifact.filename.is_empty());
            assert!(!artifact.signature_base64.is_empty());
            assert!(!artifact.url.is_empty());
        }
    }

    #[test]
    fn artifact_lookup_is_exact() {
        let manifest = ReleaseManifest::from_slice(RELEASE_JSON.as_bytes()).unwrap();
        let latest = manifest.version_info("v1.2.3").unwrap();

        let artifact = latest.artifact_for_platform("darwin", "arm64").unwrap();
        assert_eq!(artifact.digest, "bb");

        let err = latest.artifact_for_platform("darwin", "amd64").unwrap_err();
        assert!(matches!(err, UpdaterError::ArtifactNotFound { .. }));
    }

    #[test]
    fn unknown_version_is_an_error() {
        let manifest = ReleaseManifest::from_slice(RELEASE_JSON.as_bytes()).unwrap();
        let err = manifest.version_info("v9.9.9").unwrap_err();
        assert!(matches!(err, UpdaterError::VersionNotFound(v) if v == "v9.9.9"));
    }

    #[test]
    fn public_key_comparison_is_exact() {
        let manifest = ReleaseManifest::from_slice(RELEASE_JSON.as_bytes()).unwrap();
        let key = std::str::from_utf8(crate::meta::AUTHORS_PUBLIC_KEY_PEM).unwrap();
        assert!(manifest.is_signed_by(key));
        assert!(!manifest.is_signed_by(key.trim_end()));
        assert!(!manifest.is_signed_by("wrong"));
    }

    #[test]
    fn structurally_invalid_body_is_a_decode_error() {
        let err = ReleaseManifest::from_slice(br#"{"latest": 3}"#).unwrap_err();
        assert!(matches!(err, UpdaterError::ManifestDecode(_)));
    }
}
