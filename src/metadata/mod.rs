//! Metadata acquisition: remote provider, on-disk cache, sidecar documents,
//! and the processor driving the search/compare/save workflow.

pub mod cache;
pub mod processor;
pub mod record;
pub mod tmdb;

pub use cache::MetadataCache;
pub use processor::MovieMetadataProcessor;
pub use record::{ImageRecord, MetadataComparison, MovieMetadata};
pub use tmdb::{MovieSearchResult, RemoteGate, TmdbClient};
