//! TMDB (The Movie Database) remote client and record projection.
//!
//! The client wraps the TMDB v3 REST API with a 30-second request timeout and
//! an internal retry budget of 10 attempts for transient failures (429 with
//! `Retry-After` support, 5xx, transport errors). Exhausting the budget
//! surfaces as [`Error::RemoteUnavailable`] and is not retried further by any
//! caller.
//!
//! All outbound calls serialize through a [`RemoteGate`], so at most one
//! request to the provider is in flight process-wide.
//!
//! [`project`] turns a raw wire record into the normalized [`MovieMetadata`]
//! shape, field by field, so every copied field is auditable.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metadata::record::{CastMember, CrewMember, MovieMetadata};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Total attempts per logical request before giving up.
const MAX_ATTEMPTS: u32 = 10;

/// Sub-resources appended to every movie fetch; everything downstream
/// projection and trailer display need, in one round trip.
const APPEND_TO_RESPONSE: &str = "alternative_titles,credits,images,keywords,releases,videos";

// ---------------------------------------------------------------------------
// Single-flight gate
// ---------------------------------------------------------------------------

/// Mutual-exclusion gate serializing every remote provider call.
///
/// Owned by the process's dependency wiring and handed to the client at
/// construction; at most one outbound request exists at a time regardless of
/// which identifier is being fetched. The cost is head-of-line blocking, the
/// benefit is a bounded outbound request rate.
#[derive(Clone, Default)]
pub struct RemoteGate(Arc<Mutex<()>>);

impl RemoteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the remote provider.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

// ---------------------------------------------------------------------------
// Wire types (raw provider schema, persisted verbatim by the cache)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbMovie {
    pub id: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub runtime: Option<u32>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub belongs_to_collection: Option<TmdbCollection>,
    pub genres: Vec<TmdbGenre>,
    pub keywords: Option<TmdbKeywords>,
    pub alternative_titles: Option<TmdbAlternativeTitles>,
    pub credits: Option<TmdbCredits>,
    pub images: Option<TmdbImages>,
    pub releases: Option<TmdbReleases>,
    pub videos: Option<TmdbVideos>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbCollection {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbKeywords {
    pub keywords: Vec<TmdbKeyword>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbKeyword {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbAlternativeTitles {
    pub titles: Vec<TmdbAlternativeTitle>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbAlternativeTitle {
    pub iso_3166_1: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbCredits {
    pub cast: Vec<TmdbCast>,
    pub crew: Vec<TmdbCrew>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbCast {
    pub id: i64,
    pub name: String,
    pub character: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbCrew {
    pub id: i64,
    pub name: String,
    pub job: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbImages {
    pub posters: Vec<TmdbImage>,
    pub backdrops: Vec<TmdbImage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbImage {
    pub file_path: String,
    pub iso_639_1: Option<String>,
    pub vote_average: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbReleases {
    pub countries: Vec<TmdbReleaseCountry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbReleaseCountry {
    pub iso_3166_1: String,
    pub certification: String,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbVideos {
    pub results: Vec<TmdbVideo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbVideo {
    pub key: String,
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<TmdbSearchMovie>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TmdbSearchMovie {
    id: i64,
    title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    poster_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// One ranked candidate from a text search, in provider ranking order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSearchResult {
    pub tmdb_id: i64,
    pub title: Option<String>,
    pub poster_url: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// TMDB v3 API client. Cheap to clone.
#[derive(Clone)]
pub struct TmdbClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
    gate: RemoteGate,
}

impl TmdbClient {
    /// Create a client with the given API key, language tag, and the
    /// process-wide [`RemoteGate`].
    pub fn new(api_key: String, language: String, gate: RemoteGate) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: TMDB_BASE_URL.to_string(),
            api_key,
            language,
            gate,
        }
    }

    /// Point the client at a different API root. Used by tests and proxies.
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Search for movies by text. Results keep the provider's ranking.
    pub async fn search(&self, text: &str) -> Result<Vec<MovieSearchResult>> {
        let url = self.url("/search/movie", &[("query", text)]);
        debug!(url = %url, "TMDB search");

        let _guard = self.gate.acquire().await;
        let body: TmdbSearchResponse = self.get_json(&url).await?;

        Ok(body
            .results
            .into_iter()
            .map(|r| MovieSearchResult {
                tmdb_id: r.id,
                title: r.title,
                poster_url: r.poster_path.as_deref().map(image_url),
                overview: r.overview,
                release_date: parse_date(r.release_date.as_deref()),
            })
            .collect())
    }

    /// Fetch the raw record for one movie, with every sub-resource the
    /// downstream projection needs appended to the response.
    pub async fn movie(&self, tmdb_id: i64) -> Result<TmdbMovie> {
        let url = self.url(
            &format!("/movie/{tmdb_id}"),
            &[("append_to_response", APPEND_TO_RESPONSE)],
        );
        debug!(url = %url, "TMDB fetch movie");

        let _guard = self.gate.acquire().await;
        self.get_json(&url).await
    }

    fn url(&self, path: &str, extra_params: &[(&str, &str)]) -> String {
        let mut params = vec![
            ("api_key", self.api_key.as_str()),
            ("language", self.language.as_str()),
        ];
        params.extend_from_slice(extra_params);
        reqwest::Url::parse_with_params(&format!("{}{path}", self.base_url), &params)
            .expect("valid TMDB URL")
            .to_string()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.get(url).await?;
        resp.json()
            .await
            .map_err(|e| Error::RemoteUnavailable(format!("unexpected TMDB response: {e}")))
    }

    /// Execute a GET with the retry budget. Transient failures (429, 5xx,
    /// transport errors) are retried with backoff until the budget runs out.
    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let transient =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if transient && attempts < MAX_ATTEMPTS {
                        let wait = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(1);
                        warn!(
                            attempt = attempts,
                            status = %status,
                            wait_secs = wait,
                            "TMDB request failed, backing off"
                        );
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    }
                    return Err(Error::RemoteUnavailable(format!(
                        "TMDB returned HTTP {status} after {attempts} attempts"
                    )));
                }
                Err(e) if attempts < MAX_ATTEMPTS => {
                    warn!(attempt = attempts, error = %e, "TMDB request error, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    return Err(Error::RemoteUnavailable(format!(
                        "TMDB request failed after {attempts} attempts: {e}"
                    )));
                }
            }
        }
    }
}

/// Convert a TMDB image path fragment to a full original-size URL.
pub fn image_url(path: &str) -> String {
    format!("{TMDB_IMAGE_BASE}{path}")
}

fn parse_date(date: Option<&str>) -> Option<NaiveDate> {
    date.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project a raw wire record into the normalized [`MovieMetadata`] shape.
///
/// Region handling: the earliest US release supplies the certification and
/// release date, and alternate titles are filtered to the US region. When the
/// provider has no US entry the fields stay absent rather than falling back
/// to another region.
pub fn project(movie: &TmdbMovie) -> MovieMetadata {
    let mut metadata = MovieMetadata {
        tmdb_id: Some(movie.id),
        title: movie.title.clone(),
        description: movie.overview.clone(),
        summary: movie.overview.clone(),
        collection: movie.belongs_to_collection.as_ref().map(|c| c.name.clone()),
        genres: movie.genres.iter().map(|g| g.name.clone()).collect(),
        keywords: movie
            .keywords
            .as_ref()
            .map(|k| k.keywords.iter().map(|k| k.name.clone()).collect())
            .unwrap_or_default(),
        runtime: movie.runtime,
        ..MovieMetadata::default()
    };

    if let Some(release) = earliest_us_release(movie) {
        if !release.certification.is_empty() {
            metadata.rating = Some(release.certification.clone());
        }
        metadata.release_date = parse_date(release.release_date.as_deref());
    }

    let mut titles: Vec<String> = Vec::new();
    if let Some(title) = &movie.title {
        titles.push(title.clone());
    }
    if let Some(alternatives) = &movie.alternative_titles {
        titles.extend(
            alternatives
                .titles
                .iter()
                .filter(|t| t.iso_3166_1.eq_ignore_ascii_case("us"))
                .map(|t| t.title.clone()),
        );
    }
    metadata.titles = dedup_preserving_order(titles);

    if let Some(credits) = &movie.credits {
        metadata.cast = credits
            .cast
            .iter()
            .map(|c| CastMember {
                name: c.name.clone(),
                character: c.character.clone(),
                tmdb_id: c.id,
            })
            .collect();
        metadata.crew = credits
            .crew
            .iter()
            .map(|c| CrewMember {
                name: c.name.clone(),
                job: c.job.clone(),
                tmdb_id: c.id,
            })
            .collect();
    }

    // Posters: the record's marked poster first, then English-language
    // alternates.
    let mut poster_urls: Vec<String> = Vec::new();
    if let Some(path) = &movie.poster_path {
        poster_urls.push(image_url(path));
    }
    if let Some(images) = &movie.images {
        poster_urls.extend(
            images
                .posters
                .iter()
                .filter(|i| matches_language(i, false))
                .map(|i| image_url(&i.file_path)),
        );
    }
    metadata.poster_urls = dedup_preserving_order(poster_urls);

    // Backdrops: the marked backdrop first, then the rest ordered by
    // descending popularity. Language-unset entries keep their score
    // position in that ordering rather than being segregated.
    let mut backdrop_urls: Vec<String> = Vec::new();
    if let Some(path) = &movie.backdrop_path {
        backdrop_urls.push(image_url(path));
    }
    if let Some(images) = &movie.images {
        let mut ranked: Vec<&TmdbImage> = images
            .backdrops
            .iter()
            .filter(|i| matches_language(i, true))
            .collect();
        ranked.sort_by(|a, b| {
            b.vote_average
                .partial_cmp(&a.vote_average)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        backdrop_urls.extend(ranked.iter().map(|i| image_url(&i.file_path)));
    }
    metadata.backdrop_urls = dedup_preserving_order(backdrop_urls);

    metadata
}

fn earliest_us_release(movie: &TmdbMovie) -> Option<&TmdbReleaseCountry> {
    movie
        .releases
        .as_ref()?
        .countries
        .iter()
        .filter(|c| c.iso_3166_1.eq_ignore_ascii_case("us"))
        .min_by(|a, b| {
            // Entries without a date sort last.
            let a_date = parse_date(a.release_date.as_deref());
            let b_date = parse_date(b.release_date.as_deref());
            match (a_date, b_date) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        })
}

fn matches_language(image: &TmdbImage, allow_unset: bool) -> bool {
    match image.iso_639_1.as_deref() {
        Some(lang) => lang.eq_ignore_ascii_case("en"),
        None => allow_unset,
    }
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}
