//! Detached Ed25519 signature checks over hex-encoded digests.
//!
//! The authority signs the raw digest bytes, not their hex rendering; the hex
//! form only exists because manifests carry digests as strings.

use crate::digest::FileDigest;
use crate::error::{Result, UpdaterError};
use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use spki::der::{DecodePem, ErrorKind as DerErrorKind};
use spki::{ObjectIdentifier, SubjectPublicKeyInfoOwned};

/// `id-Ed25519` from RFC 8410.
const ED25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// Verifies detached signatures against a PEM-encoded public key.
pub trait SignatureVerifier: Send + Sync {
    /// Returns `Ok(true)` only if `signature_base64` was produced by the
    /// private counterpart of `public_key_pem` over the bytes `digest_hex`
    /// decodes to. Malformed inputs are errors, not `Ok(false)`; a decodable
    /// signature of the wrong length is `Ok(false)`.
    fn verify(&self, public_key_pem: &[u8], digest_hex: &str, signature_base64: &str)
        -> Result<bool>;
}

/// Stateless Ed25519 auditor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Auditor;

impl SignatureVerifier for Ed25519Auditor {
    fn verify(
        &self,
        public_key_pem: &[u8],
        digest_hex: &str,
        signature_base64: &str,
    ) -> Result<bool> {
        verify_signature(public_key_pem, digest_hex, signature_base64)
    }
}

/// See [`SignatureVerifier::verify`].
pub fn verify_signature(
    public_key_pem: &[u8],
    digest_hex: &str,
    signature_base64: &str,
) -> Result<bool> {
    if public_key_pem.is_empty() {
        return Err(UpdaterError::EmptyPublicKey);
    }

    // Signature files are usually written with a trailing newline.
    let signature_base64 = signature_base64.trim();
    if signature_base64.is_empty() {
        return Err(UpdaterError::EmptySignature);
    }

    let verifying_key = parse_public_key(public_key_pem)?;

    let raw_signature = general_purpose::STANDARD
        .decode(signature_base64)
        .map_err(|err| UpdaterError::InvalidSignatureEncoding(err.to_string()))?;
    let message = hex::decode(digest_hex)
        .map_err(|err| UpdaterError::InvalidDigestEncoding(err.to_string()))?;

    // A signature of the wrong length is well-formed input that cannot verify.
    let Ok(signature) = Signature::from_slice(&raw_signature) else {
        return Ok(false);
    };

    Ok(verifying_key.verify_strict(&message, &signature).is_ok())
}

/// Decode a `PUBLIC KEY` PEM document, accepting Ed25519 keys only.
pub fn parse_public_key(public_key_pem: &[u8]) -> Result<VerifyingKey> {
    let pem = std::str::from_utf8(public_key_pem)
        .map_err(|err| UpdaterError::InvalidPem(err.to_string()))?
        .trim();

    let info = SubjectPublicKeyInfoOwned::from_pem(pem).map_err(|err| match err.kind() {
        DerErrorKind::Pem(_) => UpdaterError::InvalidPem(err.to_string()),
        _ => UpdaterError::InvalidPublicKey(err.to_string()),
    })?;

    if info.algorithm.oid != ED25519_OID {
        return Err(UpdaterError::UnsupportedKeyType(info.algorithm.oid.to_string()));
    }

    let key_bytes = info
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| {
            UpdaterError::InvalidPublicKey("key bit string is not octet aligned".into())
        })?;

    VerifyingKey::try_from(key_bytes)
        .map_err(|err| UpdaterError::InvalidPublicKey(err.to_string()))
}

/// Render a verifying key as the `PUBLIC KEY` PEM document the auditor accepts.
pub fn encode_public_key_pem(key: &VerifyingKey) -> Result<String> {
    key.to_public_key_pem(Default::default())
        .map_err(|err| UpdaterError::InvalidPublicKey(err.to_string()))
}

/// Decode a PKCS#8 `PRIVATE KEY` PEM document holding an Ed25519 key.
pub fn parse_signing_key(private_key_pem: &str) -> Result<SigningKey> {
    SigningKey::from_pkcs8_pem(private_key_pem.trim())
        .map_err(|err| UpdaterError::InvalidPrivateKey(err.to_string()))
}

/// Sign the raw digest bytes and return the base64 signature, the form
/// release manifests and `.sig.base64` files carry.
pub fn sign_digest(key: &SigningKey, digest: &FileDigest) -> String {
    general_purpose::STANDARD.encode(key.sign(digest.as_bytes()).to_bytes())
}
