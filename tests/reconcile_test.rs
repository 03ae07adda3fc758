//! Integration tests for artwork reconciliation and the save flow, against a
//! mock image server.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use damson::artwork::ArtworkReconciler;
use damson::catalog::{LibraryScanner, MovieCatalog, MovieLocation};
use damson::metadata::record::{load_sidecar, write_sidecar, MovieMetadata};
use damson::metadata::tmdb::{RemoteGate, TmdbClient};
use damson::metadata::{MetadataCache, MovieMetadataProcessor};
use damson::{Error, Result};

const FOLDER_URL: &str = "http://host/movies/Avatar/";

async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    for name in ["a.jpg", "b.jpg"] {
        Mock::given(method("GET"))
            .and(path(format!("/img/{name}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(name.as_bytes().to_vec(), "image/jpeg"),
            )
            .mount(&server)
            .await;
    }
    server
}

fn reconciler(temp_dir: &Path) -> ArtworkReconciler {
    ArtworkReconciler::new("http://host".into(), temp_dir.to_path_buf())
}

#[tokio::test]
async fn downloads_are_positional_and_reorder_is_free() {
    let server = image_server().await;
    let movie_dir = tempfile::tempdir().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    let reconciler = reconciler(temp_dir.path());

    let url_a = format!("{}/img/a.jpg", server.uri());
    let url_b = format!("{}/img/b.jpg", server.uri());

    let records = reconciler
        .reconcile_backdrops(
            &[],
            &[url_a.clone(), url_b.clone()],
            movie_dir.path(),
            FOLDER_URL,
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source_url.as_deref(), Some(url_a.as_str()));
    assert_eq!(records[1].source_url.as_deref(), Some(url_b.as_str()));
    for record in &records {
        let file = movie_dir.path().join(record.path.as_ref().unwrap());
        assert!(file.exists());
    }
    // Staging left nothing behind.
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);

    // Reordering the desired list reuses both files.
    let reordered = reconciler
        .reconcile_backdrops(
            &records,
            &[url_b.clone(), url_a.clone()],
            movie_dir.path(),
            FOLDER_URL,
        )
        .await
        .unwrap();
    assert_eq!(reordered, vec![records[1].clone(), records[0].clone()]);

    // Two downloads total: one per image, none for the reorder.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn reconciliation_is_idempotent() {
    let server = image_server().await;
    let movie_dir = tempfile::tempdir().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    let reconciler = reconciler(temp_dir.path());

    let desired = vec![format!("{}/img/a.jpg", server.uri())];
    let first = reconciler
        .reconcile_backdrops(&[], &desired, movie_dir.path(), FOLDER_URL)
        .await
        .unwrap();
    let second = reconciler
        .reconcile_backdrops(&first, &desired, movie_dir.path(), FOLDER_URL)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn one_failed_download_aborts_the_whole_operation() {
    let server = image_server().await;
    Mock::given(method("GET"))
        .and(path("/img/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let movie_dir = tempfile::tempdir().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    let reconciler = reconciler(temp_dir.path());

    let desired = vec![
        format!("{}/img/a.jpg", server.uri()),
        format!("{}/img/missing.jpg", server.uri()),
    ];
    let err = reconciler
        .reconcile_backdrops(&[], &desired, movie_dir.path(), FOLDER_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Download { .. }));
}

#[tokio::test]
async fn poster_sync_downloads_and_deletes() {
    let server = image_server().await;
    let movie_dir = tempfile::tempdir().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    let reconciler = reconciler(temp_dir.path());

    let poster = movie_dir.path().join("poster.jpg");
    let desired = vec![format!("{}/img/a.jpg", server.uri())];

    reconciler
        .sync_poster(&desired, movie_dir.path())
        .await
        .unwrap();
    assert_eq!(std::fs::read(&poster).unwrap(), b"a.jpg");

    reconciler.sync_poster(&[], movie_dir.path()).await.unwrap();
    assert!(!poster.exists());
}

// ---------------------------------------------------------------------------
// Save flow
// ---------------------------------------------------------------------------

struct StubCatalog {
    location: MovieLocation,
}

#[async_trait]
impl MovieCatalog for StubCatalog {
    async fn movie_by_id(&self, movie_id: i64) -> Result<MovieLocation> {
        if movie_id == 42 {
            Ok(self.location.clone())
        } else {
            Err(Error::MovieNotFound(movie_id))
        }
    }
}

#[derive(Default)]
struct CountingScanner {
    reprocessed: AtomicUsize,
    last_path: std::sync::Mutex<Option<PathBuf>>,
}

#[async_trait]
impl LibraryScanner for CountingScanner {
    async fn reprocess(&self, folder_path: &Path) -> Result<()> {
        self.reprocessed.fetch_add(1, Ordering::SeqCst);
        *self.last_path.lock().unwrap() = Some(folder_path.to_path_buf());
        Ok(())
    }
}

fn processor_for(
    server: &MockServer,
    movie_dir: &Path,
    temp_dir: &Path,
    scanner: Arc<CountingScanner>,
) -> MovieMetadataProcessor {
    let client = TmdbClient::new("test-key".into(), "en-US".into(), RemoteGate::new())
        .with_base_url(server.uri());
    let catalog = Arc::new(StubCatalog {
        location: MovieLocation {
            folder_path: movie_dir.to_path_buf(),
            folder_url: FOLDER_URL.to_string(),
            source_id: 1,
        },
    });
    MovieMetadataProcessor::new(
        MetadataCache::new(temp_dir.join("cache"), client.clone()),
        client,
        catalog,
        scanner,
        ArtworkReconciler::new("http://host".into(), temp_dir.to_path_buf()),
    )
}

#[tokio::test]
async fn save_reconciles_artwork_rewrites_sidecar_and_reprocesses() {
    let server = image_server().await;
    let movie_dir = tempfile::tempdir().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    let scanner = Arc::new(CountingScanner::default());
    let processor = processor_for(&server, movie_dir.path(), temp_dir.path(), scanner.clone());

    // A previous save left stale fields behind; this save must replace the
    // whole document.
    write_sidecar(
        movie_dir.path(),
        &MovieMetadata {
            title: Some("Old Title".into()),
            keywords: vec!["stale".into()],
            ..MovieMetadata::default()
        },
    )
    .unwrap();

    let incoming = MovieMetadata {
        tmdb_id: Some(19995),
        title: Some("Avatar".into()),
        poster_urls: vec![format!("{}/img/a.jpg", server.uri())],
        backdrop_urls: vec![format!("{}/img/b.jpg", server.uri())],
        ..MovieMetadata::default()
    };

    processor.save(42, incoming).await.unwrap();

    let saved = load_sidecar(movie_dir.path());
    assert_eq!(saved.title.as_deref(), Some("Avatar"));
    assert!(saved.keywords.is_empty());
    assert_eq!(saved.backdrops.len(), 1);
    let backdrop = movie_dir
        .path()
        .join(saved.backdrops[0].path.as_ref().unwrap());
    assert_eq!(std::fs::read(backdrop).unwrap(), b"b.jpg");
    assert_eq!(
        std::fs::read(movie_dir.path().join("poster.jpg")).unwrap(),
        b"a.jpg"
    );

    assert_eq!(scanner.reprocessed.load(Ordering::SeqCst), 1);
    assert_eq!(
        scanner.last_path.lock().unwrap().as_deref(),
        Some(movie_dir.path())
    );
}

#[tokio::test]
async fn save_with_unknown_movie_id_is_an_error() {
    let server = image_server().await;
    let movie_dir = tempfile::tempdir().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    let scanner = Arc::new(CountingScanner::default());
    let processor = processor_for(&server, movie_dir.path(), temp_dir.path(), scanner.clone());

    let err = processor
        .save(7, MovieMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MovieNotFound(7)));
    assert_eq!(scanner.reprocessed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_save_leaves_the_sidecar_untouched() {
    let server = image_server().await;
    Mock::given(method("GET"))
        .and(path("/img/broken.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let movie_dir = tempfile::tempdir().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    let scanner = Arc::new(CountingScanner::default());
    let processor = processor_for(&server, movie_dir.path(), temp_dir.path(), scanner.clone());

    let original = MovieMetadata {
        title: Some("Untouched".into()),
        ..MovieMetadata::default()
    };
    write_sidecar(movie_dir.path(), &original).unwrap();

    let incoming = MovieMetadata {
        title: Some("Should Not Land".into()),
        backdrop_urls: vec![format!("{}/img/broken.jpg", server.uri())],
        ..MovieMetadata::default()
    };
    let err = processor.save(42, incoming).await.unwrap_err();
    assert!(matches!(err, Error::Download { .. }));

    assert_eq!(load_sidecar(movie_dir.path()), original);
    assert_eq!(scanner.reprocessed.load(Ordering::SeqCst), 0);
}
