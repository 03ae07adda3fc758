//! External collaborator interfaces.
//!
//! The catalog that owns movie records and the library scanner that
//! re-processes a folder after a save both live outside this crate. The core
//! only needs a read-only lookup and a reprocess hook, so they are modeled as
//! traits implemented by the embedding application.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// Where a movie lives on disk and how it is reached publicly.
#[derive(Debug, Clone)]
pub struct MovieLocation {
    /// Absolute path of the movie's folder.
    pub folder_path: PathBuf,
    /// Public URL of the movie's folder, with a trailing slash.
    pub folder_url: String,
    /// Identifier of the configured source this movie belongs to.
    pub source_id: i64,
}

/// Read-only lookup into the movie catalog.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Resolve a movie id to its on-disk location.
    ///
    /// Returns [`Error::MovieNotFound`](crate::error::Error::MovieNotFound)
    /// when the id is unknown.
    async fn movie_by_id(&self, movie_id: i64) -> Result<MovieLocation>;
}

/// Hook into the library scanning pipeline.
#[async_trait]
pub trait LibraryScanner: Send + Sync {
    /// Re-process a movie folder so the catalog picks up freshly saved
    /// metadata and artwork. Awaited to completion by the save flow.
    async fn reprocess(&self, folder_path: &Path) -> Result<()>;
}
