/// Path utilities for validation and normalization
///
/// All functions are **pure**: given same input, always produce same output with no side effects.

use std::borrow::Cow;

/// Validates if a path is in canonical form
///
/// # Rules
///
/// - Must start with `/`
/// - Must not contain `//` or `\`
/// - Must not end with `/` (except root `/`)
/// - Must not be empty
///
/// # Examples
///
/// ```
/// use ingest_router::path::is_valid_path;
///
/// assert!(is_valid_path("/"));
/// assert!(is_valid_path("/blog/john"));
///
/// assert!(!is_valid_path(""));
/// assert!(!is_valid_path("blog")); // Missing leading /
/// assert!(!is_valid_path("/blog/")); // Trailing /
/// assert!(!is_valid_path("/blog//john")); // Double //
/// assert!(!is_valid_path("/blog\\john")); // Backslash
/// ```
pub fn is_valid_path(path: &str) -> bool {
    if path.is_empty() || !path.starts_with('/') {
        return false;
    }

    if path.contains("//") || path.contains('\\') {
        return false;
    }

    path == "/" || !path.ends_with('/')
}

/// Normalize a path to canonical form
///
/// Returns `Cow::Borrowed` when input is already valid (zero allocations).
/// Returns `Cow::Owned` when normalization needed (single allocation).
///
/// - Trailing slashes: `/path/` → `/path`
/// - Double slashes: `/path//to` → `/path/to`
/// - Backslashes: `\path\to` → `/path/to`
///
/// # Examples
///
/// ```
/// use ingest_router::path::normalize_path;
/// use std::borrow::Cow;
///
/// let path = normalize_path("/blog");
/// assert!(matches!(path, Cow::Borrowed("/blog")));
///
/// assert_eq!(normalize_path("/blog/"), "/blog");
/// assert_eq!(normalize_path("\\blog\\john"), "/blog/john");
/// assert_eq!(normalize_path("/blog//john///articles"), "/blog/john/articles");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_valid_path(path) {
        return Cow::Borrowed(path);
    }

    let normalized = path
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if normalized.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{}", normalized))
    }
}

/// Splits a request target into its path and (undecoded) query string
///
/// Any `#fragment` is dropped.
///
/// ```
/// use ingest_router::path::split_url;
///
/// assert_eq!(split_url("/blog?page=2"), ("/blog", Some("page=2")));
/// assert_eq!(split_url("/blog#top"), ("/blog", None));
/// assert_eq!(split_url("/blog"), ("/blog", None));
/// ```
pub fn split_url(url: &str) -> (&str, Option<&str>) {
    let without_fragment = url.split_once('#').map(|(head, _)| head).unwrap_or(url);
    match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    }
}

/// Iterates the non-empty segments of a path
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
