//! Path and URL utilities.
//!
//! Maps local asset paths to publicly reachable URLs based on the configured
//! media sources, and provides the small path/title helpers used by the
//! discovery and comparison flows.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::Source;
use crate::error::{Error, Result};

/// List of artwork image extensions recognized by discovery.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Check if a path has a recognized image file extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Check whether `child` sits somewhere below `parent` in the directory tree.
///
/// Walks the parent chain of `child` comparing whole components, so
/// `/media/movies-extra` is not contained by `/media/movies` the way a plain
/// prefix string test would claim.
pub fn is_contained_by_directory(child: &Path, parent: &Path) -> bool {
    child
        .ancestors()
        .skip(1)
        .any(|ancestor| ancestor.components().eq(parent.components()))
}

/// Map a local file path to its public URL.
///
/// Selects the configured source whose folder directory-contains the path and
/// joins the source's public URL with the path relative to that folder. A path
/// matched by no source is a configuration defect and fatal.
pub fn url_for_path(sources: &[Source], path: &Path) -> Result<String> {
    let source = sources
        .iter()
        .find(|s| is_contained_by_directory(path, &s.folder_path))
        .ok_or_else(|| Error::UnknownSource(path.to_path_buf()))?;

    // strip_prefix cannot fail once containment has been established
    let relative = path.strip_prefix(&source.folder_path).unwrap_or(path);
    Ok(format!(
        "{}/{}",
        source.public_url.trim_end_matches('/'),
        relative.to_string_lossy().replace('\\', "/")
    ))
}

/// Map a list of local file paths to public URLs. See [`url_for_path`].
pub fn urls_for_paths<'a, I>(sources: &[Source], paths: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = &'a Path>,
{
    paths
        .into_iter()
        .map(|p| url_for_path(sources, p))
        .collect()
}

/// Extract a four-digit year from a folder name like `"Avatar (2009)"`.
pub fn year_from_folder_name(folder_name: &str) -> Option<i32> {
    static YEAR_RE: OnceLock<Regex> = OnceLock::new();
    let re = YEAR_RE.get_or_init(|| Regex::new(r"\((\d{4})\)").expect("static regex"));
    re.captures(folder_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Reduce a title to lowercase alphanumerics for comparison purposes.
///
/// Ampersands become `and` first, since filesystem-safe folder names often
/// spell the word out.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace('&', "and")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Compare two titles ignoring case and special characters.
pub fn titles_are_equivalent(a: &str, b: &str) -> bool {
    normalize_title(a) == normalize_title(b)
}
