mod common;

use common::{release_manifest, Authority};
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use updater::{
    ApplicationMeta, FileDigest, HttpDownloader, OnUpgradeReady, StagedArtifact, UpdateOutcome,
    Updater, UpdaterConfig, UpdaterError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTIFACT: &[u8] = b"\x7fELF pretend this is the v1.2.3 server binary";

struct Release {
    server: MockServer,
    temp_dir: tempfile::TempDir,
}

impl Release {
    /// Publish a signed manifest whose artifact was signed over `signed`
    /// while the host actually serves `served`.
    async fn publish(authority: &Authority, signed: &[u8], served: &[u8]) -> Self {
        let server = MockServer::start().await;
        let artifact_url = format!("{}/download/self-updater-linux-amd64", server.uri());
        let manifest = release_manifest(authority, "v1.2.3", &artifact_url, signed);

        Mock::given(method("GET"))
            .and(path("/release.json.sig.base64"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "{}\n",
                authority.sign(&manifest)
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/release.json"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(manifest))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/download/self-updater-linux-amd64"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(served.to_vec()))
            .mount(&server)
            .await;

        Self {
            server,
            temp_dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    fn updater(&self, authority: &Authority, running: &str, on_ready: OnUpgradeReady) -> Updater {
        let mut meta = ApplicationMeta::new(
            FileDigest::from_bytes([1; 32]),
            running,
            "0000000",
            "/opt/self-updater",
        );
        meta.os = "linux".into();
        meta.arch = "amd64".into();
        meta.authors_public_key = authority.public_key_pem.clone().into_bytes();

        let config = UpdaterConfig {
            manifest_url: Some(format!("{}/release.json", self.server.uri())),
            ..UpdaterConfig::default()
        };
        let downloader = HttpDownloader::builder().temp_dir(self.temp_dir.path()).build();

        Updater::builder(meta, config)
            .downloader(Arc::new(downloader))
            .build(on_ready)
    }
}

fn recorder() -> (OnUpgradeReady, Arc<Mutex<Vec<StagedArtifact>>>) {
    let staged = Arc::new(Mutex::new(Vec::new()));
    let sink = staged.clone();
    (
        Arc::new(move |artifact| sink.lock().unwrap().push(artifact)),
        staged,
    )
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn verified_release_is_handed_over_as_open_file() {
    let authority = Authority::new(11);
    let release = Release::publish(&authority, ARTIFACT, ARTIFACT).await;
    let (on_ready, staged) = recorder();

    let outcome = release.updater(&authority, "v1.2.2", on_ready).run().await;

    assert!(
        matches!(outcome, UpdateOutcome::Staged { ref version } if version == "v1.2.3"),
        "got {outcome:?}"
    );
    let mut staged = staged.lock().unwrap();
    assert_eq!(staged.len(), 1);

    let mut content = Vec::new();
    staged[0].file.read_to_end(&mut content).unwrap();
    assert_eq!(content, ARTIFACT);

    // Manifest and signature downloads are gone; only the artifact remains.
    assert_eq!(files_in(release.temp_dir.path()), 1);
    drop(staged);
}

#[tokio::test]
async fn tampered_artifact_is_discarded() {
    let authority = Authority::new(11);
    let mut tampered = ARTIFACT.to_vec();
    tampered[0] ^= 0xff;
    let release = Release::publish(&authority, ARTIFACT, &tampered).await;
    let (on_ready, staged) = recorder();

    let outcome = release.updater(&authority, "v1.2.2", on_ready).run().await;

    match outcome {
        UpdateOutcome::Failed(err @ UpdaterError::IntegrityMismatch { .. }) => {
            assert!(err.to_string().contains("digest does not match"));
        }
        other => panic!("expected integrity mismatch, got {other:?}"),
    }
    assert!(staged.lock().unwrap().is_empty());
    assert_eq!(files_in(release.temp_dir.path()), 0);
}

#[tokio::test]
async fn running_latest_is_a_no_op() {
    let authority = Authority::new(11);
    let release = Release::publish(&authority, ARTIFACT, ARTIFACT).await;
    let (on_ready, staged) = recorder();

    let outcome = release.updater(&authority, "v1.2.3", on_ready).run().await;

    assert!(matches!(outcome, UpdateOutcome::UpToDate));
    assert!(staged.lock().unwrap().is_empty());
    assert_eq!(files_in(release.temp_dir.path()), 0);
}

#[tokio::test]
async fn manifest_from_another_authority_is_rejected() {
    let impostor = Authority::new(66);
    let trusted = Authority::new(11);
    let release = Release::publish(&impostor, ARTIFACT, ARTIFACT).await;
    let (on_ready, staged) = recorder();

    let outcome = release.updater(&trusted, "v1.2.2", on_ready).run().await;

    assert!(
        matches!(outcome, UpdateOutcome::Failed(UpdaterError::ManifestSignatureInvalid)),
        "got {outcome:?}"
    );
    assert!(staged.lock().unwrap().is_empty());
    assert_eq!(files_in(release.temp_dir.path()), 0);
}
