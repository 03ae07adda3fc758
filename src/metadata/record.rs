//! Normalized movie metadata and the per-movie sidecar file.
//!
//! The sidecar (`movie.json`, lower-camel-case field names) is the durable
//! representation of a movie's metadata and artwork records. It is read at
//! merge/reconcile start and fully overwritten, never patched, at save
//! completion. An absent or unreadable sidecar is treated as an empty record.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Name of the per-movie sidecar document.
pub const SIDECAR_FILE: &str = "movie.json";

/// Folder inside a movie directory holding downloaded backdrops.
pub const BACKDROP_DIR: &str = "backdrops";

/// Conventional poster filename inside a movie directory.
pub const POSTER_FILE: &str = "poster.jpg";

/// Normalized movie metadata, as persisted in the sidecar and exchanged with
/// callers during comparison and save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovieMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Primary title plus region-filtered alternate titles, deduplicated,
    /// order preserving.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub titles: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Collection this movie belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Runtime in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,

    /// Earliest applicable US certification, absent when the provider has
    /// none. Never synthesized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cast: Vec<CastMember>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub crew: Vec<CrewMember>,

    /// Desired poster sources, in display order, deduplicated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub poster_urls: Vec<String>,

    /// Desired backdrop sources, in display order, deduplicated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backdrop_urls: Vec<String>,

    /// Persisted artwork records, positionally mirroring `backdrop_urls`
    /// after a successful reconciliation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backdrops: Vec<ImageRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CastMember {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    pub tmdb_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrewMember {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    pub tmdb_id: i64,
}

/// One persisted artwork asset.
///
/// Every record carries at least one of `path` and `source_url`. A record
/// with only a `path` is a manually added local asset with no known remote
/// origin; a record with only a `source_url` is transient, about to be
/// downloaded, and never persisted in that state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageRecord {
    /// Path relative to the movie folder, e.g. `backdrops/xyz.jpg`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Remote origin URL this asset was downloaded from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl ImageRecord {
    /// A locally present asset with no known remote origin.
    pub fn from_path<S: Into<String>>(path: S) -> Self {
        Self {
            path: Some(path.into()),
            source_url: None,
        }
    }

    /// A transient record for an asset about to be downloaded.
    pub fn from_source_url<S: Into<String>>(url: S) -> Self {
        Self {
            path: None,
            source_url: Some(url.into()),
        }
    }
}

/// Side-by-side pairing of a movie's current metadata and a freshly fetched
/// remote record, returned to callers for diffing. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataComparison {
    pub current: MovieMetadata,
    pub incoming: MovieMetadata,
}

/// Path of the sidecar document inside a movie folder.
pub fn sidecar_path(movie_folder: &Path) -> PathBuf {
    movie_folder.join(SIDECAR_FILE)
}

/// Load the sidecar for a movie folder.
///
/// An absent file yields an empty record; an unreadable or unparsable file is
/// logged and also yields an empty record. Corruption here is recoverable by
/// design, the next save rewrites the document from scratch.
pub fn load_sidecar(movie_folder: &Path) -> MovieMetadata {
    let path = sidecar_path(movie_folder);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return MovieMetadata::default(),
    };
    match serde_json::from_str(&content) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable sidecar, treating as empty");
            MovieMetadata::default()
        }
    }
}

/// Atomically rewrite the sidecar for a movie folder.
///
/// Writes to a temporary file in the same directory and renames it over the
/// old document, so readers never observe a partial write.
pub fn write_sidecar(movie_folder: &Path, metadata: &MovieMetadata) -> Result<()> {
    let path = sidecar_path(movie_folder);
    let json = serde_json::to_string_pretty(metadata).expect("sidecar serialization");
    let staging = movie_folder.join(format!(".{SIDECAR_FILE}.tmp"));
    std::fs::write(&staging, json)?;
    std::fs::rename(&staging, &path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_fields_are_camel_case() {
        let metadata = MovieMetadata {
            tmdb_id: Some(19995),
            title: Some("Avatar".into()),
            release_date: NaiveDate::from_ymd_opt(2009, 12, 18),
            backdrop_urls: vec!["http://img/x.jpg".into()],
            backdrops: vec![ImageRecord {
                path: Some("backdrops/x.jpg".into()),
                source_url: Some("http://img/x.jpg".into()),
            }],
            ..MovieMetadata::default()
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"tmdbId\":19995"));
        assert!(json.contains("\"releaseDate\":\"2009-12-18\""));
        assert!(json.contains("\"backdropUrls\""));
        assert!(json.contains("\"sourceUrl\""));
        // Empty collections stay out of the document.
        assert!(!json.contains("\"genres\""));
    }

    #[test]
    fn load_absent_sidecar_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_sidecar(dir.path()), MovieMetadata::default());
    }

    #[test]
    fn load_corrupt_sidecar_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(sidecar_path(dir.path()), "{not json!").unwrap();
        assert_eq!(load_sidecar(dir.path()), MovieMetadata::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = MovieMetadata {
            title: Some("Avatar".into()),
            titles: vec!["Avatar".into(), "Avatar 3D".into()],
            genres: vec!["Action".into(), "Science Fiction".into()],
            runtime: Some(162),
            rating: Some("PG-13".into()),
            cast: vec![CastMember {
                name: "Sam Worthington".into(),
                character: Some("Jake Sully".into()),
                tmdb_id: 65731,
            }],
            backdrops: vec![ImageRecord::from_path("backdrops/a.jpg")],
            ..MovieMetadata::default()
        };
        write_sidecar(dir.path(), &metadata).unwrap();
        assert_eq!(load_sidecar(dir.path()), metadata);
        // No staging file left behind.
        assert!(!dir.path().join(".movie.json.tmp").exists());
    }

    #[test]
    fn write_overwrites_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let first = MovieMetadata {
            title: Some("Old".into()),
            keywords: vec!["stale".into()],
            ..MovieMetadata::default()
        };
        write_sidecar(dir.path(), &first).unwrap();

        let second = MovieMetadata {
            title: Some("New".into()),
            ..MovieMetadata::default()
        };
        write_sidecar(dir.path(), &second).unwrap();

        let loaded = load_sidecar(dir.path());
        assert_eq!(loaded.title.as_deref(), Some("New"));
        assert!(loaded.keywords.is_empty());
    }
}
