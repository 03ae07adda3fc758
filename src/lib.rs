//! Damson - movie metadata and artwork manager
//!
//! Fetches movie metadata from TMDB through an on-disk cache, keeps each
//! movie folder's `movie.json` sidecar and artwork files in sync with the
//! chosen metadata, and discovers locally added artwork by filename
//! convention.

pub mod artwork;
pub mod catalog;
pub mod config;
pub mod error;
pub mod metadata;
pub mod paths;

pub use error::{Error, Result};
