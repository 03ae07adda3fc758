//! Artwork reconciliation: make the files inside a movie folder match a
//! desired list of artwork URLs.
//!
//! Backdrop reconciliation is positional. The returned records mirror the
//! desired URL list index for index, reusing already-downloaded files where
//! the source URL matches, and downloading the rest sequentially through a
//! temp-file staging step. Any single download failure aborts the whole
//! operation; the caller must not persist partial results.
//!
//! The poster has cardinality one. Only the first desired poster URL is
//! materialized, always as `poster.jpg`, and an empty desired list deletes
//! the conventional poster file.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::metadata::record::{ImageRecord, BACKDROP_DIR, POSTER_FILE};

pub struct ArtworkReconciler {
    http: reqwest::Client,
    /// Public base URL of this server; URLs under it are already local.
    base_url: String,
    temp_dir: PathBuf,
}

impl ArtworkReconciler {
    pub fn new(base_url: String, temp_dir: PathBuf) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            temp_dir,
        }
    }

    /// Reconcile the backdrops of a movie folder against `desired_urls`.
    ///
    /// Returns one record per desired URL, in the same order. `current`
    /// records are reused when their source URL matches a desired URL and
    /// the file they point at still exists.
    pub async fn reconcile_backdrops(
        &self,
        current: &[ImageRecord],
        desired_urls: &[String],
        movie_folder: &Path,
        folder_url: &str,
    ) -> Result<Vec<ImageRecord>> {
        let mut records = Vec::with_capacity(desired_urls.len());

        for url in desired_urls {
            // URLs served by this very server point at files already inside
            // the folder; record the relative path and never download.
            if self.is_self_referential(url) {
                let relative = url.strip_prefix(folder_url).unwrap_or(url);
                records.push(ImageRecord::from_path(relative));
                continue;
            }

            if let Some(existing) = current
                .iter()
                .find(|r| r.source_url.as_deref() == Some(url.as_str()))
            {
                let present = existing
                    .path
                    .as_ref()
                    .is_some_and(|p| movie_folder.join(p).exists());
                if present {
                    debug!(url = %url, "reusing existing backdrop");
                    records.push(existing.clone());
                    continue;
                }
            }

            let file_name = format!("{}.{}", Uuid::new_v4(), url_extension(url));
            let relative = format!("{BACKDROP_DIR}/{file_name}");
            let destination = movie_folder.join(BACKDROP_DIR).join(&file_name);
            self.download(url, &destination).await?;
            info!(url = %url, path = %destination.display(), "downloaded backdrop");

            records.push(ImageRecord {
                path: Some(relative),
                source_url: Some(url.clone()),
            });
        }

        Ok(records)
    }

    /// Make `poster.jpg` match the first desired poster URL, or remove it
    /// when no poster is desired.
    pub async fn sync_poster(
        &self,
        desired_urls: &[String],
        movie_folder: &Path,
    ) -> Result<()> {
        let poster_path = movie_folder.join(POSTER_FILE);

        let Some(url) = desired_urls.first() else {
            if poster_path.exists() {
                info!(path = %poster_path.display(), "removing poster, none desired");
                std::fs::remove_file(&poster_path)?;
            }
            return Ok(());
        };

        // A self-referential URL is the conventional poster itself.
        if self.is_self_referential(url) {
            return Ok(());
        }

        self.download(url, &poster_path).await?;
        info!(url = %url, path = %poster_path.display(), "downloaded poster");
        Ok(())
    }

    fn is_self_referential(&self, url: &str) -> bool {
        !self.base_url.is_empty() && url.starts_with(&self.base_url)
    }

    /// Download `url` into `destination` through a staging file, so the
    /// destination only ever holds complete downloads.
    async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        let staging = self
            .temp_dir
            .join(format!("{}.{}", Uuid::new_v4(), url_extension(url)));

        let result = self.fetch_to_staging(url, &staging).await;
        let result = result.and_then(|()| self.promote(&staging, destination));
        if result.is_err() {
            if let Err(e) = std::fs::remove_file(&staging) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %staging.display(), error = %e, "failed to remove staging file");
                }
            }
        }
        result
    }

    async fn fetch_to_staging(&self, url: &str, staging: &Path) -> Result<()> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::download(url, e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::download(url, format!("HTTP {}", resp.status())));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::download(url, e.to_string()))?;

        std::fs::create_dir_all(&self.temp_dir)?;
        std::fs::write(staging, &bytes)?;
        Ok(())
    }

    /// Move a completed staging file into place. Copy then delete, because
    /// the temp dir and the media library commonly live on different
    /// filesystems.
    fn promote(&self, staging: &Path, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(staging, destination)?;
        std::fs::remove_file(staging)?;
        Ok(())
    }
}

/// File extension of the final path segment of a URL, query string ignored.
/// Falls back to `jpg` when the URL has none.
fn url_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_from_url() {
        assert_eq!(url_extension("http://img/x/abc.png"), "png");
        assert_eq!(url_extension("http://img/x/abc.jpg?size=big"), "jpg");
        assert_eq!(url_extension("http://img/x/abc"), "jpg");
        assert_eq!(url_extension("http://img/x/abc."), "jpg");
    }

    #[test]
    fn self_reference_requires_configured_base_url() {
        let reconciler =
            ArtworkReconciler::new(String::new(), std::env::temp_dir());
        assert!(!reconciler.is_self_referential("http://host/movies/Avatar/backdrops/a.jpg"));

        let reconciler =
            ArtworkReconciler::new("http://host".into(), std::env::temp_dir());
        assert!(reconciler.is_self_referential("http://host/movies/Avatar/backdrops/a.jpg"));
        assert!(!reconciler.is_self_referential("https://image.tmdb.org/t/p/original/a.jpg"));
    }

    #[tokio::test]
    async fn empty_desired_list_deletes_poster() {
        let dir = tempfile::tempdir().unwrap();
        let poster = dir.path().join(POSTER_FILE);
        std::fs::write(&poster, b"old poster").unwrap();

        let reconciler =
            ArtworkReconciler::new("http://host".into(), std::env::temp_dir());
        reconciler.sync_poster(&[], dir.path()).await.unwrap();
        assert!(!poster.exists());

        // Deleting an absent poster is a no-op.
        reconciler.sync_poster(&[], dir.path()).await.unwrap();
    }

    #[tokio::test]
    async fn self_referential_backdrops_are_never_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler =
            ArtworkReconciler::new("http://host".into(), std::env::temp_dir());

        let desired = vec!["http://host/movies/Avatar/backdrops/a.jpg".to_string()];
        let records = reconciler
            .reconcile_backdrops(&[], &desired, dir.path(), "http://host/movies/Avatar/")
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path.as_deref(), Some("backdrops/a.jpg"));
        assert_eq!(records[0].source_url, None);
    }

    #[tokio::test]
    async fn matching_record_with_existing_file_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let backdrops = dir.path().join(BACKDROP_DIR);
        std::fs::create_dir_all(&backdrops).unwrap();
        std::fs::write(backdrops.join("existing.jpg"), b"img").unwrap();

        let current = vec![ImageRecord {
            path: Some("backdrops/existing.jpg".into()),
            source_url: Some("https://image.tmdb.org/t/p/original/a.jpg".into()),
        }];
        let desired = vec!["https://image.tmdb.org/t/p/original/a.jpg".to_string()];

        let reconciler =
            ArtworkReconciler::new("http://host".into(), std::env::temp_dir());
        let records = reconciler
            .reconcile_backdrops(&current, &desired, dir.path(), "http://host/movies/Avatar/")
            .await
            .unwrap();

        assert_eq!(records, current);
    }

    #[tokio::test]
    async fn download_failure_aborts_reconciliation() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler =
            ArtworkReconciler::new("http://host".into(), std::env::temp_dir());

        // Nothing listens on this port.
        let desired = vec!["http://127.0.0.1:1/missing.jpg".to_string()];
        let err = reconciler
            .reconcile_backdrops(&[], &desired, dir.path(), "http://host/movies/Avatar/")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Download { .. }));
    }
}
