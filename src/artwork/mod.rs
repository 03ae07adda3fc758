//! Artwork handling: filename-convention discovery of local posters and
//! backdrops, and reconciliation of folder contents against desired URLs.

pub mod discovery;
pub mod reconcile;

pub use discovery::{
    filesystem_is_case_sensitive, filter_and_sort_image_paths, find_backdrop_paths,
    find_poster_paths, ImageKind,
};
pub use reconcile::ArtworkReconciler;
