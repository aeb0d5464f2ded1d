use crate::error::{Result, UpdaterError};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// SHA-256 digest of a file's contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileDigest([u8; 32]);

impl FileDigest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering, the form manifests and signatures use.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDigest({})", self.to_hex())
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Computes content hashes of files on disk.
pub trait Digester: Send + Sync {
    /// Hash the file at `path`.
    fn digest_file(&self, path: &Path) -> Result<FileDigest>;
}

/// Streaming SHA-256 digester; never holds the whole file in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Digester;

impl Digester for Sha256Digester {
    fn digest_file(&self, path: &Path) -> Result<FileDigest> {
        digest_file(path)
    }
}

/// Hash the file at `path` through a fixed-size read buffer.
pub fn digest_file(path: &Path) -> Result<FileDigest> {
    let mut file = File::open(path).map_err(|source| UpdaterError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(UpdaterError::Io(err)),
        };
        hasher.update(&buf[..n]);
    }

    Ok(FileDigest(hasher.finalize().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn matches_one_shot_sha256() {
        let content = b"hello, world!";
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();

        let digest = digest_file(file.path()).unwrap();
        assert_eq!(digest.to_hex(), hex::encode(Sha256::digest(content)));
    }

    #[test]
    fn spans_multiple_buffer_reads() {
        let content: Vec<u8> = (0..READ_BUFFER_SIZE * 3 + 17).map(|i| i as u8).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&content).unwrap();

        let first = Sha256Digester.digest_file(file.path()).unwrap();
        let second = Sha256Digester.digest_file(file.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_bytes().as_slice(), Sha256::digest(&content).as_slice());
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = digest_file(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, UpdaterError::FileOpen { .. }));
    }
}
