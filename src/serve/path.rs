//! URL to filesystem path resolution.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Resolve a request URL to a file under `root`.
///
/// Directories resolve to their `index.html`; extensionless URLs fall back
/// to a sibling `.html` file. Anything escaping `root` is rejected.
pub fn resolve_path(url: &str, root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);

    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    let root = root.canonicalize().ok()?;
    let local = root.join(&clean);

    if let Some(found) = existing_file(&local, &root) {
        return Some(found);
    }

    if local.extension().is_none() && !clean.is_empty() {
        return existing_file(&local.with_extension("html"), &root);
    }

    None
}

/// Canonical file for `candidate`, provided it stays under `root`.
fn existing_file(candidate: &Path, root: &Path) -> Option<PathBuf> {
    // Canonicalize to resolve symlinks before the containment check
    let canonical = candidate.canonicalize().ok()?;
    if !canonical.starts_with(root) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    let index = canonical.join("index.html");
    index.is_file().then_some(index)
}

/// Decode, strip query string and fragment, trim slashes.
fn normalize_url(url: &str) -> String {
    let decoded = percent_decode_str(url)
        .decode_utf8()
        .map(Cow::into_owned)
        .unwrap_or_default();

    let path = decoded.split(['?', '#']).next().unwrap_or_default();
    path.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("index.html"), "home").unwrap();
        fs::create_dir_all(root.join("blog/first post")).unwrap();
        fs::write(root.join("blog/first post/index.html"), "post").unwrap();
        fs::write(root.join("about.html"), "about").unwrap();
        fs::write(root.join("style.css"), "body {}").unwrap();
        dir
    }

    fn resolved(url: &str, dir: &TempDir) -> Option<String> {
        resolve_path(url, dir.path()).map(|p| fs::read_to_string(p).unwrap())
    }

    #[test]
    fn test_root_serves_index() {
        let dir = site();
        assert_eq!(resolved("/", &dir).as_deref(), Some("home"));
    }

    #[test]
    fn test_directory_serves_index_with_encoded_name() {
        let dir = site();
        assert_eq!(resolved("/blog/first%20post/", &dir).as_deref(), Some("post"));
    }

    #[test]
    fn test_clean_url_falls_back_to_html() {
        let dir = site();
        assert_eq!(resolved("/about", &dir).as_deref(), Some("about"));
    }

    #[test]
    fn test_query_and_fragment_ignored() {
        let dir = site();
        assert_eq!(resolved("/style.css?v=3", &dir).as_deref(), Some("body {}"));
        assert_eq!(resolved("/about#team", &dir).as_deref(), Some("about"));
    }

    #[test]
    fn test_missing_file() {
        let dir = site();
        assert!(resolve_path("/nope.css", dir.path()).is_none());
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = site();
        assert!(resolve_path("/../etc/passwd", dir.path()).is_none());
        assert!(resolve_path("/blog/%2e%2e/%2e%2e/secret", dir.path()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();

        let dir = site();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(resolve_path("/link/secret.txt", dir.path()).is_none());
    }
}
