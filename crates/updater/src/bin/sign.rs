use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use updater::audit::{parse_signing_key, sign_digest};
use updater::digest::digest_file;

/// Sign a release file for publication.
///
/// Prints the base64 Ed25519 signature over the file's SHA-256 digest, the
/// value that goes into `release.json.sig.base64` or an artifact's
/// `signatureBase64`.
#[derive(Parser, Debug)]
#[clap(version, about = "Sign a release file with the authority key")]
struct Args {
    /// PKCS#8 PEM file holding the Ed25519 private key
    private_key: PathBuf,

    /// File to sign
    file: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let pem = std::fs::read_to_string(&args.private_key)
        .with_context(|| format!("reading {}", args.private_key.display()))?;
    let key = parse_signing_key(&pem)?;
    let digest = digest_file(&args.file)?;

    println!("{}", sign_digest(&key, &digest));
    Ok(())
}
