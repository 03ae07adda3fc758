//! On-disk cache of raw provider records.
//!
//! Each movie is cached as `{tmdb_id}.json` holding the provider's own wire
//! schema, untouched by projection, so cached data survives changes to the
//! normalized shape. A record is fresh while its file modification time is
//! within the max age (30 days by default). A missing, stale, or unparsable
//! file is a miss; corruption is never fatal, the next fetch overwrites it.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::error::Result;
use crate::metadata::tmdb::{TmdbClient, TmdbMovie};

/// How long a cached record stays fresh.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

pub struct MetadataCache {
    cache_dir: PathBuf,
    client: TmdbClient,
    max_age: Duration,
}

impl MetadataCache {
    pub fn new(cache_dir: PathBuf, client: TmdbClient) -> Self {
        Self {
            cache_dir,
            client,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    /// Override the freshness window. Used by tests.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Fetch the raw record for a movie, from cache when fresh, otherwise
    /// from the remote provider. A remote fetch persists the record before
    /// returning it.
    pub async fn fetch(&self, tmdb_id: i64) -> Result<TmdbMovie> {
        if let Some(movie) = self.load_cached(tmdb_id) {
            debug!(tmdb_id, "metadata cache hit");
            return Ok(movie);
        }

        debug!(tmdb_id, "metadata cache miss, fetching from TMDB");
        let movie = self.client.movie(tmdb_id).await?;
        self.store(tmdb_id, &movie);
        Ok(movie)
    }

    fn cache_path(&self, tmdb_id: i64) -> PathBuf {
        self.cache_dir.join(format!("{tmdb_id}.json"))
    }

    fn load_cached(&self, tmdb_id: i64) -> Option<TmdbMovie> {
        let path = self.cache_path(tmdb_id);
        let metadata = std::fs::metadata(&path).ok()?;
        let modified = metadata.modified().ok()?;
        if !is_fresh(modified, SystemTime::now(), self.max_age) {
            debug!(tmdb_id, "cached record is stale");
            return None;
        }
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(movie) => Some(movie),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cached record, refetching");
                None
            }
        }
    }

    /// Persist a freshly fetched record. Failure to write only costs the next
    /// call a refetch, so it is logged and swallowed.
    fn store(&self, tmdb_id: i64, movie: &TmdbMovie) {
        let path = self.cache_path(tmdb_id);
        let json = match serde_json::to_string_pretty(movie) {
            Ok(json) => json,
            Err(e) => {
                warn!(tmdb_id, error = %e, "failed to serialize record for cache");
                return;
            }
        };
        if let Err(e) = std::fs::create_dir_all(&self.cache_dir) {
            warn!(path = %self.cache_dir.display(), error = %e, "failed to create cache dir");
            return;
        }
        if let Err(e) = std::fs::write(&path, json) {
            warn!(path = %path.display(), error = %e, "failed to write cached record");
        }
    }
}

/// Whether a record modified at `modified` is still fresh at `now`.
fn is_fresh(modified: SystemTime, now: SystemTime, max_age: Duration) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age <= max_age,
        // A future mtime (clock skew) counts as fresh.
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn record_is_fresh_within_window() {
        let now = SystemTime::now();
        let modified = now - 29 * DAY;
        assert!(is_fresh(modified, now, DEFAULT_MAX_AGE));
    }

    #[test]
    fn record_is_stale_past_window() {
        let now = SystemTime::now();
        let modified = now - 31 * DAY;
        assert!(!is_fresh(modified, now, DEFAULT_MAX_AGE));
    }

    #[test]
    fn future_mtime_counts_as_fresh() {
        let now = SystemTime::now();
        let modified = now + DAY;
        assert!(is_fresh(modified, now, DEFAULT_MAX_AGE));
    }
}
