#![allow(dead_code)]

use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::json;
use sha2::{Digest, Sha256};
use updater::encode_public_key_pem;

/// A release authority with a deterministic key pair.
pub struct Authority {
    key: SigningKey,
    pub public_key_pem: String,
}

impl Authority {
    pub fn new(seed: u8) -> Self {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let public_key_pem = encode_public_key_pem(&key.verifying_key()).expect("encodes");
        Self {
            key,
            public_key_pem,
        }
    }

    /// Base64 signature over the SHA-256 digest of `bytes`.
    pub fn sign(&self, bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        general_purpose::STANDARD.encode(self.key.sign(&digest).to_bytes())
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// A single-release manifest with one linux/amd64 artifact.
pub fn release_manifest(
    authority: &Authority,
    latest: &str,
    artifact_url: &str,
    artifact_bytes: &[u8],
) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "latest": latest,
        "publicKey": authority.public_key_pem,
        "versions": [{
            "version": latest,
            "commit": "9f1c2ab",
            "artifacts": [{
                "os": "linux",
                "arch": "amd64",
                "filename": "self-updater-linux-amd64",
                "digest": sha256_hex(artifact_bytes),
                "signatureBase64": authority.sign(artifact_bytes),
                "url": artifact_url,
            }]
        }]
    }))
    .expect("manifest serialises")
}
