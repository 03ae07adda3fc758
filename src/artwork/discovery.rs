//! Local artwork discovery.
//!
//! Finds poster and backdrop image files that live alongside a video file,
//! classified and ordered by filename convention:
//!
//! - Posters carry the video's base name or a well-known alias
//!   (`cover`, `default`, `folder`, `movie`, `poster`), e.g. `Avatar.jpg`.
//! - Backdrops carry a backdrop keyword (`art`, `backdrop`, `background`,
//!   `fanart`), optionally prefixed with the video's base name, e.g.
//!   `Avatar-fanart.jpg` or plain `backdrop.png`.
//!
//! An optional `-N` numeric suffix is an explicit order key; files without one
//! sort as key 0. Whether matching is case sensitive is decided by probing the
//! actual filesystem once per process, never assumed from the platform.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::RegexBuilder;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::paths::is_image_file;

/// The two artwork classes stored alongside a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Poster,
    Backdrop,
}

/// Find the poster image paths for a video, in display order.
pub fn find_poster_paths(video_path: &Path) -> Result<Vec<PathBuf>> {
    let images = images_in_directory(video_path)?;
    let base = video_base_name(video_path);
    Ok(filter_and_sort_image_paths(
        &base,
        &images,
        ImageKind::Poster,
        filesystem_is_case_sensitive(),
    ))
}

/// Find the backdrop image paths for a video, in display order.
pub fn find_backdrop_paths(video_path: &Path) -> Result<Vec<PathBuf>> {
    let images = images_in_directory(video_path)?;
    let base = video_base_name(video_path);
    Ok(filter_and_sort_image_paths(
        &base,
        &images,
        ImageKind::Backdrop,
        filesystem_is_case_sensitive(),
    ))
}

/// List every image file in the video's directory, sorted by file name so
/// discovery order is deterministic across platforms.
fn images_in_directory(video_path: &Path) -> Result<Vec<PathBuf>> {
    let dir = video_path.parent().unwrap_or_else(|| Path::new("."));
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn video_base_name(video_path: &Path) -> String {
    video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Classify and order a set of image paths for one video.
///
/// Returns the matching paths sorted ascending by order key; the sort is
/// stable, so files sharing a key keep their incoming order.
pub fn filter_and_sort_image_paths(
    video_base_name: &str,
    image_paths: &[PathBuf],
    kind: ImageKind,
    case_sensitive: bool,
) -> Vec<PathBuf> {
    let escaped = regex::escape(video_base_name);
    let pattern = match kind {
        ImageKind::Poster => format!(
            r"^(?:{escaped}|cover|default|folder|movie|poster)(?:-(\d+))?\.(?:jpg|jpeg|png)$"
        ),
        ImageKind::Backdrop => format!(
            r"^(?:(?:{escaped}-)?(?:art|backdrop|background|fanart))(?:-(\d+))?\.(?:jpg|jpeg|png)$"
        ),
    };
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .expect("artwork filename pattern");

    let mut matched: Vec<(PathBuf, u32)> = Vec::new();
    for path in image_paths {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            continue;
        };
        if let Some(captures) = re.captures(&name) {
            let order = captures
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            matched.push((path.clone(), order));
        }
    }
    matched.sort_by_key(|(_, order)| *order);
    matched.into_iter().map(|(path, _)| path).collect()
}

/// Whether the filesystem hosting the temp directory is case sensitive.
///
/// Measured once per process by creating a temp file and testing whether its
/// upper-cased name resolves; the result is memoized for the process lifetime.
pub fn filesystem_is_case_sensitive() -> bool {
    static CASE_SENSITIVE: OnceLock<bool> = OnceLock::new();
    *CASE_SENSITIVE.get_or_init(|| {
        let sensitive = probe_case_sensitivity().unwrap_or(true);
        debug!(case_sensitive = sensitive, "probed filesystem case sensitivity");
        sensitive
    })
}

fn probe_case_sensitivity() -> std::io::Result<bool> {
    let name = Uuid::new_v4().to_string();
    let lower = std::env::temp_dir().join(&name);
    std::fs::File::create(&lower)?;
    let upper = std::env::temp_dir().join(name.to_uppercase());
    let sensitive = !upper.exists();
    let _ = std::fs::remove_file(&lower);
    Ok(sensitive)
}
