//! End-to-end pipeline tests: manifest discovery, wiremock-backed fetch,
//! filesystem blob store, and snapshot republish across runs.

mod support;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use legisfetch_core::{
    BlobStore, DiscoverySource, FetchDispatcher, FsBlobStore, HttpClient, LedgerStore,
    ManifestSource, Pipeline, RateLimiter,
};
use support::socket_guard::start_mock_server_or_skip;

const LEDGER_KEY: &str = "ledger.csv";

struct Harness {
    store_dir: TempDir,
    scratch_dir: TempDir,
    manifest_path: std::path::PathBuf,
    _manifest_dir: TempDir,
    base_url: Url,
}

impl Harness {
    fn new(mock_server: &MockServer, manifest: &str) -> Self {
        let manifest_dir = TempDir::new().unwrap();
        let manifest_path = manifest_dir.path().join("manifest.json");
        std::fs::write(&manifest_path, manifest).unwrap();
        Self {
            store_dir: TempDir::new().unwrap(),
            scratch_dir: TempDir::new().unwrap(),
            manifest_path,
            _manifest_dir: manifest_dir,
            base_url: Url::parse(&mock_server.uri()).unwrap(),
        }
    }

    fn blob(&self) -> Arc<dyn BlobStore> {
        Arc::new(FsBlobStore::new(self.store_dir.path()))
    }

    fn ledger_store(&self) -> LedgerStore {
        LedgerStore::new(self.blob(), LEDGER_KEY)
    }

    fn pipeline(&self) -> Pipeline {
        let source: Box<dyn DiscoverySource> = Box::new(ManifestSource::new(&self.manifest_path));
        let dispatcher = Arc::new(FetchDispatcher::new(
            HttpClient::new_with_timeouts(5, 5),
            self.blob(),
            Arc::new(RateLimiter::disabled()),
            "pdfs",
            self.base_url.clone(),
            self.scratch_dir.path(),
        ));
        Pipeline::new(self.ledger_store(), source, dispatcher, 4)
    }

    fn snapshot_bytes(&self) -> Vec<u8> {
        std::fs::read(self.store_dir.path().join(LEDGER_KEY)).unwrap()
    }

    fn rewrite_manifest(&self, manifest: &str) {
        std::fs::write(&self.manifest_path, manifest).unwrap();
    }
}

fn manifest_for(server: &MockServer, paths: &[&str]) -> String {
    let entries: Vec<String> = paths
        .iter()
        .map(|p| {
            format!(
                r#"{{"url": "{}{}", "provenance": "projets_lois"}}"#,
                server.uri(),
                p
            )
        })
        .collect();
    format!("[{}]", entries.join(","))
}

fn landing_page(pdf_href: &str) -> String {
    format!(
        r#"<html><body>
          <a title="Accéder au document au format PDF" href="{pdf_href}">PDF</a>
        </body></html>"#
    )
}

async fn mount_success_document(server: &MockServer, page_path: &str, pdf_path: &str) {
    Mock::given(method("GET"))
        .and(path(page_path.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(landing_page(pdf_path)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(pdf_path.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 artifact" as &[u8]))
        .mount(server)
        .await;
}

fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn test_full_run_classifies_and_publishes() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    mount_success_document(&mock_server, "/17/projets/pl0001.asp", "/17/pdf/pl0001.pdf").await;
    Mock::given(method("GET"))
        .and(path("/17/projets/pl0002.asp"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/17/projets/pl0003.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no affordance</html>"))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(
        &mock_server,
        &manifest_for(
            &mock_server,
            &[
                "/17/projets/pl0001.asp",
                "/17/projets/pl0002.asp",
                "/17/projets/pl0003.asp",
            ],
        ),
    );

    let summary = harness.pipeline().run(None).await.unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.new_urls, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.no_link, 1);
    assert_eq!(summary.ledger_size, 3);
    assert!(!summary.nothing_to_do);

    // The artifact landed under the prefix and the scratch dir is clean.
    let blob = harness.blob();
    assert_eq!(
        blob.get("pdfs/projet_loi_0001.pdf").await.unwrap(),
        b"%PDF-1.4 artifact"
    );
    assert!(scratch_is_empty(harness.scratch_dir.path()));

    // Ledger state per URL.
    let ledger = harness.ledger_store().load().await.unwrap();
    let success = ledger
        .get(&format!("{}/17/projets/pl0001.asp", mock_server.uri()))
        .unwrap();
    assert!(success.downloaded);
    assert_eq!(success.artifact_name.as_deref(), Some("projet_loi_0001.pdf"));
    let gone = ledger
        .get(&format!("{}/17/projets/pl0002.asp", mock_server.uri()))
        .unwrap();
    assert!(gone.is_404);
    assert!(!gone.downloaded);
    let pending = ledger
        .get(&format!("{}/17/projets/pl0003.asp", mock_server.uri()))
        .unwrap();
    assert!(pending.is_retryable());

    for record in ledger.records() {
        assert!(record.invariant_holds());
    }
}

#[tokio::test]
async fn test_second_run_skips_done_urls_and_converges_retry() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    // pl0001 succeeds, pl0002 is flaky: its landing page 500s on run one
    // and recovers on run two.
    mount_success_document(&mock_server, "/17/projets/pl0001.asp", "/17/pdf/pl0001.pdf").await;
    Mock::given(method("GET"))
        .and(path("/17/projets/pl0002.asp"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    mount_success_document(&mock_server, "/17/projets/pl0002.asp", "/17/pdf/pl0002.pdf").await;

    let harness = Harness::new(
        &mock_server,
        &manifest_for(
            &mock_server,
            &["/17/projets/pl0001.asp", "/17/projets/pl0002.asp"],
        ),
    );

    let first = harness.pipeline().run(None).await.unwrap();
    assert_eq!(first.succeeded, 1);
    assert_eq!(first.fetch_failed, 1);

    // Run two: pl0001 is downloaded (excluded), pl0002 is retried and
    // now converges to success.
    let second = harness.pipeline().run(None).await.unwrap();
    assert_eq!(second.new_urls, 0);
    assert_eq!(second.retried, 1);
    assert_eq!(second.succeeded, 1);

    let ledger = harness.ledger_store().load().await.unwrap();
    assert!(ledger.records().all(|r| r.downloaded));
}

#[tokio::test]
async fn test_runs_are_idempotent_when_nothing_changes() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    mount_success_document(&mock_server, "/17/projets/pl0001.asp", "/17/pdf/pl0001.pdf").await;
    Mock::given(method("GET"))
        .and(path("/17/projets/pl0002.asp"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(
        &mock_server,
        &manifest_for(
            &mock_server,
            &["/17/projets/pl0001.asp", "/17/projets/pl0002.asp"],
        ),
    );

    harness.pipeline().run(None).await.unwrap();
    let first_snapshot = harness.snapshot_bytes();

    // With no new discoveries and no retryable records the second run is
    // a no-op and must not republish.
    let second = harness.pipeline().run(None).await.unwrap();
    assert!(second.nothing_to_do);
    assert_eq!(harness.snapshot_bytes(), first_snapshot);
}

#[tokio::test]
async fn test_404_url_is_never_refetched() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    // The 404 landing page must be requested exactly once across both
    // runs: after the flag is set the planner excludes the URL.
    Mock::given(method("GET"))
        .and(path("/17/projets/pl0404.asp"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let harness = Harness::new(
        &mock_server,
        &manifest_for(&mock_server, &["/17/projets/pl0404.asp"]),
    );

    let first = harness.pipeline().run(None).await.unwrap();
    assert_eq!(first.not_found, 1);

    let second = harness.pipeline().run(None).await.unwrap();
    assert!(second.nothing_to_do);
}

#[tokio::test]
async fn test_store_failure_degrades_success_to_fetch_failed() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    mount_success_document(&mock_server, "/17/projets/pl0001.asp", "/17/pdf/pl0001.pdf").await;

    let harness = Harness::new(
        &mock_server,
        &manifest_for(&mock_server, &["/17/projets/pl0001.asp"]),
    );

    // A blob store rooted at an unwritable path fails every artifact put.
    let broken_blob: Arc<dyn BlobStore> =
        Arc::new(FsBlobStore::new("/proc/legisfetch-denied"));
    let source: Box<dyn DiscoverySource> = Box::new(ManifestSource::new(&harness.manifest_path));
    let dispatcher = Arc::new(FetchDispatcher::new(
        HttpClient::new_with_timeouts(5, 5),
        broken_blob,
        Arc::new(RateLimiter::disabled()),
        "pdfs",
        harness.base_url.clone(),
        harness.scratch_dir.path(),
    ));
    // Ledger store still points at the working directory so the merge
    // result is observable.
    let pipeline = Pipeline::new(harness.ledger_store(), source, dispatcher, 2);

    let summary = pipeline.run(None).await.unwrap();
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.fetch_failed, 1);

    // Retrieved-but-not-persisted must stay retryable.
    let ledger = harness.ledger_store().load().await.unwrap();
    let record = ledger
        .get(&format!("{}/17/projets/pl0001.asp", mock_server.uri()))
        .unwrap();
    assert!(record.is_retryable());
    assert!(scratch_is_empty(harness.scratch_dir.path()));
}

#[tokio::test]
async fn test_rediscovered_known_url_keeps_single_ledger_row() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/17/projets/pl0009.asp"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nothing</html>"))
        .mount(&mock_server)
        .await;

    let harness = Harness::new(
        &mock_server,
        &manifest_for(&mock_server, &["/17/projets/pl0009.asp"]),
    );

    harness.pipeline().run(None).await.unwrap();
    // Same manifest again: the URL is re-discovered and also retryable.
    harness.pipeline().run(None).await.unwrap();

    let ledger = harness.ledger_store().load().await.unwrap();
    assert_eq!(ledger.len(), 1, "re-discovery must not duplicate the row");
}

#[tokio::test]
async fn test_rate_limited_run_still_completes() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    mount_success_document(&mock_server, "/17/projets/pl0001.asp", "/17/pdf/pl0001.pdf").await;

    let harness = Harness::new(
        &mock_server,
        &manifest_for(&mock_server, &["/17/projets/pl0001.asp"]),
    );

    let source: Box<dyn DiscoverySource> = Box::new(ManifestSource::new(&harness.manifest_path));
    let dispatcher = Arc::new(FetchDispatcher::new(
        HttpClient::new_with_timeouts(5, 5),
        harness.blob(),
        Arc::new(RateLimiter::new(Duration::from_millis(30))),
        "pdfs",
        harness.base_url.clone(),
        harness.scratch_dir.path(),
    ));
    let pipeline = Pipeline::new(harness.ledger_store(), source, dispatcher, 2);

    let summary = pipeline.run(None).await.unwrap();
    assert_eq!(summary.succeeded, 1);
}
