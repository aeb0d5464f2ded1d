use std::path::PathBuf;
use std::time::Duration;

/// Convenient result alias for updater operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;

/// Coarse classification of [`UpdaterError`] used for logging and exit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fetch failures, timeouts, non-success HTTP status.
    Network,
    /// Bad keys, malformed encodings, digest or signature mismatches.
    Verification,
    /// A correctly signed document that is not a valid manifest.
    Decode,
    /// Create, rename, copy or permission failures.
    Filesystem,
    /// Spawn failures and unexpected worker exits.
    Process,
    /// Invalid environment values or schedules.
    Configuration,
}

/// Errors that can occur while checking for, verifying or installing an update.
#[derive(thiserror::Error, Debug)]
pub enum UpdaterError {
    /// Transport-level failure while talking to the release host.
    #[error("request to {url} failed: {source}")]
    Fetch {
        /// Requested URL.
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The release host answered with something other than `200 OK`.
    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus {
        /// Requested URL.
        url: String,
        /// HTTP status code returned.
        status: u16,
    },
    /// The download did not finish within its deadline.
    #[error("download of {url} timed out after {timeout:?}")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Deadline that was exceeded.
        timeout: Duration,
    },
    /// The download observed cancellation and aborted.
    #[error("download of {url} was cancelled")]
    Cancelled {
        /// Requested URL.
        url: String,
    },
    /// One or both halves of the manifest download failed.
    #[error("failed to download manifest files: {}", .failures.join("; "))]
    ManifestDownload {
        /// One message per failed download.
        failures: Vec<String>,
    },
    /// The public key handed to the auditor was empty.
    #[error("public key is empty")]
    EmptyPublicKey,
    /// The signature handed to the auditor was empty.
    #[error("signature is empty")]
    EmptySignature,
    /// The public key blob was not a PEM document.
    #[error("failed to decode PEM block: {0}")]
    InvalidPem(String),
    /// The PEM document did not contain a parseable public key.
    #[error("failed to parse public key: {0}")]
    InvalidPublicKey(String),
    /// The signing tool was given something other than a PKCS#8 Ed25519 key.
    #[error("failed to parse private key: {0}")]
    InvalidPrivateKey(String),
    /// The key parsed but uses an algorithm other than Ed25519.
    #[error("unsupported public key type: {0}")]
    UnsupportedKeyType(String),
    /// The signature was not valid base64.
    #[error("failed to decode base64 signature: {0}")]
    InvalidSignatureEncoding(String),
    /// The digest was not valid hexadecimal.
    #[error("failed to decode hex digest: {0}")]
    InvalidDigestEncoding(String),
    /// The manifest signature did not verify against the authority key.
    #[error("manifest signature verification failed: fetched manifest did not come from authors")]
    ManifestSignatureInvalid,
    /// The manifest names a different trust root than the running binary.
    #[error("manifest public key does not match application public key")]
    PublicKeyMismatch,
    /// The downloaded artifact hash did not match the manifest.
    #[error("artifact digest does not match (expected {expected}, got {actual})")]
    IntegrityMismatch {
        /// Digest listed in the manifest.
        expected: String,
        /// Digest of the downloaded bytes.
        actual: String,
    },
    /// The artifact signature did not verify against the authority key.
    #[error("artifact signature verification failed: artifact did not come from authors")]
    ArtifactSignatureInvalid,
    /// The manifest could not be decoded from JSON.
    #[error("failed to decode manifest JSON: {0}")]
    ManifestDecode(#[from] serde_json::Error),
    /// `latest` points at a version the manifest does not list.
    #[error("version {0} not found in manifest")]
    VersionNotFound(String),
    /// The release has no build for this platform.
    #[error("no artifact for platform {os}/{arch}")]
    ArtifactNotFound {
        /// Requested OS tag.
        os: String,
        /// Requested architecture tag.
        arch: String,
    },
    /// A file could not be opened.
    #[error("could not open file `{path}`: {source}")]
    FileOpen {
        /// Path that failed to open.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to perform an I/O operation.
    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),
    /// The session directory could not be created.
    #[error("failed to create session directory `{path}`: {source}")]
    SessionCreate {
        /// Directory that failed to be created.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Copying an executable failed.
    #[error("failed to copy `{from}` to `{to}`: {source}")]
    CopyFile {
        /// Executable being copied.
        from: PathBuf,
        /// Destination of the copy.
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Moving a file into its final place failed.
    #[error("failed to move `{from}` to `{to}`: {source}")]
    Rename {
        /// File being moved.
        from: PathBuf,
        /// Path it was meant to replace.
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Setting executable permission bits failed.
    #[error("failed to set permissions on `{path}`: {source}")]
    Permissions {
        /// File whose mode could not be changed.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A worker or swapper process could not be started.
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        /// Executable that failed to start.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The worker exited with something other than the update-ready code.
    #[error("worker exited with unexpected code {}", describe_exit(.code))]
    UnexpectedExit {
        /// Exit code, or `None` when the process was killed by a signal.
        code: Option<i32>,
    },
    /// The worker reported an update but left no staged binary behind.
    #[error("staged binary missing at {0}")]
    StagedBinaryMissing(PathBuf),
    /// The cron expression could not be parsed or has no next occurrence.
    #[error("invalid schedule `{schedule}`: {reason}")]
    Schedule {
        /// Offending expression.
        schedule: String,
        /// Parser message.
        reason: String,
    },
    /// A command-line flag required by the selected mode was not given.
    #[error("missing required argument {0}")]
    MissingArgument(&'static str),
    /// An environment variable held a malformed value.
    #[error("invalid value for {var}: {reason}")]
    Config {
        /// Variable name.
        var: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "<signal>".to_string(), |code| code.to_string())
}

impl UpdaterError {
    /// Map the error onto the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        use UpdaterError::*;

        match self {
            Fetch { .. }
            | UnexpectedStatus { .. }
            | Timeout { .. }
            | Cancelled { .. }
            | ManifestDownload { .. } => ErrorKind::Network,
            EmptyPublicKey
            | EmptySignature
            | InvalidPem(_)
            | InvalidPublicKey(_)
            | InvalidPrivateKey(_)
            | UnsupportedKeyType(_)
            | InvalidSignatureEncoding(_)
            | InvalidDigestEncoding(_)
            | ManifestSignatureInvalid
            | PublicKeyMismatch
            | IntegrityMismatch { .. }
            | ArtifactSignatureInvalid => ErrorKind::Verification,
            ManifestDecode(_) | VersionNotFound(_) | ArtifactNotFound { .. } => ErrorKind::Decode,
            FileOpen { .. }
            | Io(_)
            | SessionCreate { .. }
            | CopyFile { .. }
            | Rename { .. }
            | Permissions { .. }
            | StagedBinaryMissing(_) => ErrorKind::Filesystem,
            Spawn { .. } | UnexpectedExit { .. } => ErrorKind::Process,
            Schedule { .. } | Config { .. } | MissingArgument(_) => ErrorKind::Configuration,
        }
    }
}
