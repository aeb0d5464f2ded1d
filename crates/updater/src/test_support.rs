use crate::manifest::{Artifact, ReleaseInfo, ReleaseManifest};
use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signer, SigningKey};

pub(crate) const RSA_PUBLIC_KEY_PEM: &str = "-----BEGIN PUBLIC KEY-----
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA5pCKJtDgGUM5PpNuNilu
77NKq2f9Mgo1W0AGNqrq47E5Fu0xxsdoHy1UKPxLWvRiYWcEj92LVVtC221DcVkM
TKaNTnvL0L5b3LWZsKLceQD+j+Yckm2b/bbOZXnHdSr17aAK7XVbHQZpEeChCt4z
Zco6hyY1XVpXCkjIMuxBW7YSgSFFQJlt2l7cTTdSzFyiq7l9fEpu7/M7zqXryscA
L9xXbJVpTIl0sE4daVLUXFEqx1KYMzLrBdzjSQCTHSoSymvcUKVJUXW7AEdgd2jm
bvL6sq1MebtFBNw8OgnUKQxJwpAH3+S+nseTMxAJACeWVm1okc4Rr4qsjuAs7qrI
MwIDAQAB
-----END PUBLIC KEY-----
";

pub(crate) fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub(crate) fn sign_bytes(key: &SigningKey, message: &[u8]) -> String {
    general_purpose::STANDARD.encode(key.sign(message).to_bytes())
}

pub(crate) fn sign_hex(key: &SigningKey, digest_hex: &str) -> String {
    sign_bytes(key, &hex::decode(digest_hex).expect("hex digest"))
}

pub(crate) fn manifest(latest: &str, public_key: &str, artifacts: &[Artifact]) -> ReleaseManifest {
    ReleaseManifest {
        latest: latest.to_string(),
        public_key: public_key.to_string(),
        versions: vec![ReleaseInfo {
            version: latest.to_string(),
            commit: "9f1c2ab".to_string(),
            artifacts: artifacts.to_vec(),
        }],
    }
}

pub(crate) fn manifest_json(latest: &str, public_key: &str, artifacts: &[Artifact]) -> String {
    serde_json::to_string(&manifest(latest, public_key, artifacts)).expect("manifest serialises")
}

pub(crate) fn artifact(os: &str, arch: &str, digest: &str, signature: &str) -> Artifact {
    Artifact {
        os: os.to_string(),
        arch: arch.to_string(),
        filename: format!("self-updater-{os}-{arch}"),
        digest: digest.to_string(),
        signature_base64: signature.to_string(),
        url: format!("https://example.com/releases/{os}-{arch}"),
    }
}
