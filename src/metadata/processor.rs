//! The movie metadata workflow: search, compare, save.
//!
//! Ties the cache-backed provider fetch, the sidecar document, and artwork
//! reconciliation together. The save flow is the only writer: it reconciles
//! artwork against what the sidecar currently records, rewrites the sidecar
//! in full, and then hands the folder back to the library scanner.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::artwork::reconcile::ArtworkReconciler;
use crate::catalog::{LibraryScanner, MovieCatalog, MovieLocation};
use crate::error::Result;
use crate::metadata::cache::MetadataCache;
use crate::metadata::record::{
    load_sidecar, write_sidecar, ImageRecord, MetadataComparison, MovieMetadata, BACKDROP_DIR,
    POSTER_FILE,
};
use crate::metadata::tmdb::{project, MovieSearchResult, TmdbClient};

pub struct MovieMetadataProcessor {
    cache: MetadataCache,
    client: TmdbClient,
    catalog: Arc<dyn MovieCatalog>,
    scanner: Arc<dyn LibraryScanner>,
    reconciler: ArtworkReconciler,
}

impl MovieMetadataProcessor {
    pub fn new(
        cache: MetadataCache,
        client: TmdbClient,
        catalog: Arc<dyn MovieCatalog>,
        scanner: Arc<dyn LibraryScanner>,
        reconciler: ArtworkReconciler,
    ) -> Self {
        Self {
            cache,
            client,
            catalog,
            scanner,
            reconciler,
        }
    }

    /// Search the remote provider for candidate movies, in provider ranking
    /// order.
    pub async fn search_results(&self, text: &str) -> Result<Vec<MovieSearchResult>> {
        self.client.search(text).await
    }

    /// Normalized metadata for a provider movie id, served from cache when
    /// fresh.
    pub async fn incoming_metadata(&self, tmdb_id: i64) -> Result<MovieMetadata> {
        let raw = self.cache.fetch(tmdb_id).await?;
        Ok(project(&raw))
    }

    /// Pair a movie's current on-disk metadata with a fresh provider record,
    /// for side-by-side diffing before a save.
    pub async fn comparison(&self, tmdb_id: i64, movie_id: i64) -> Result<MetadataComparison> {
        let current = self.current_metadata(movie_id).await?;
        let incoming = self.incoming_metadata(tmdb_id).await?;
        Ok(MetadataComparison { current, incoming })
    }

    /// A movie's current metadata as the folder actually stands: the sidecar
    /// plus whatever artwork files are really present.
    pub async fn current_metadata(&self, movie_id: i64) -> Result<MovieMetadata> {
        let location = self.catalog.movie_by_id(movie_id).await?;
        Ok(current_metadata_for(&location))
    }

    /// Persist metadata for a movie: reconcile artwork, rewrite the sidecar,
    /// then re-process the folder.
    ///
    /// Reconciliation reads the current artwork records from the sidecar, not
    /// from the caller, so a stale client cannot orphan downloaded files. Any
    /// download failure aborts before anything is persisted.
    #[instrument(skip(self, metadata))]
    pub async fn save(&self, movie_id: i64, mut metadata: MovieMetadata) -> Result<()> {
        let location = self.catalog.movie_by_id(movie_id).await?;

        let current = load_sidecar(&location.folder_path);
        metadata.backdrops = self
            .reconciler
            .reconcile_backdrops(
                &current.backdrops,
                &metadata.backdrop_urls,
                &location.folder_path,
                &location.folder_url,
            )
            .await?;
        self.reconciler
            .sync_poster(&metadata.poster_urls, &location.folder_path)
            .await?;

        write_sidecar(&location.folder_path, &metadata)?;
        info!(movie_id, path = %location.folder_path.display(), "saved movie metadata");

        self.scanner.reprocess(&location.folder_path).await
    }
}

/// Build a movie's current metadata from its folder.
///
/// Starts from the sidecar and then reconciles the record list with reality:
/// records whose file has gone missing are dropped, backdrop files nothing
/// references become path-only records, and the conventional poster shows up
/// in `poster_urls` only when the file exists.
fn current_metadata_for(location: &MovieLocation) -> MovieMetadata {
    let mut metadata = load_sidecar(&location.folder_path);

    metadata.poster_urls = if location.folder_path.join(POSTER_FILE).exists() {
        vec![format!("{}{POSTER_FILE}", location.folder_url)]
    } else {
        Vec::new()
    };

    // A record is still meaningful if it knows its remote origin (the next
    // save can re-download it) or its file is actually present. Path-only
    // records whose file has gone missing are dropped.
    metadata.backdrops.retain(|record| {
        record.source_url.is_some()
            || record
                .path
                .as_ref()
                .is_some_and(|p| location.folder_path.join(p).exists())
    });

    // Files in the backdrop folder that no record claims were added by hand;
    // surface them as local assets with no remote origin.
    let referenced: Vec<String> = metadata
        .backdrops
        .iter()
        .filter_map(|r| r.path.clone())
        .collect();
    for file_name in backdrop_files(location) {
        let relative = format!("{BACKDROP_DIR}/{file_name}");
        if !referenced.contains(&relative) {
            metadata.backdrops.push(ImageRecord::from_path(relative));
        }
    }

    // Exposed URL: the remote origin verbatim when known, else the local URL
    // for a file that really exists. Dangling local references are skipped.
    metadata.backdrop_urls = metadata
        .backdrops
        .iter()
        .filter_map(|record| {
            if let Some(url) = &record.source_url {
                return Some(url.clone());
            }
            let path = record.path.as_ref()?;
            location
                .folder_path
                .join(path)
                .exists()
                .then(|| format!("{}{path}", location.folder_url))
        })
        .collect();

    metadata
}

/// File names inside the movie's backdrop folder, sorted for determinism.
fn backdrop_files(location: &MovieLocation) -> Vec<String> {
    let dir = location.folder_path.join(BACKDROP_DIR);
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
