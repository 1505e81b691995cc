/// Image reference normalization
///
/// Projects store bare filenames. Anything that reaches the UI or the
/// filesystem goes through `DocumentDir`, which rebuilds the full location
/// from the *current* document directory so stale absolute paths from an
/// earlier install keep working.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Marker left behind when an object was stringified instead of its URI
const OBJECT_ARTIFACT: &str = "[object Object]";
const OBJECT_ARTIFACT_ENCODED: &str = "%5Bobject%20Object%5D";

/// Generated filenames we can recover from a corrupted reference
static GENERATED_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:furniture_scene_|image_|room_scan_|demo_greg_|demo_sera_)\d+\.jpg")
        .expect("generated filename pattern is valid")
});

static IMAGE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png)$").expect("image extension pattern is valid"));

/// True when the reference carries a stringified-object artifact
pub fn is_corrupted(reference: &str) -> bool {
    reference.contains(OBJECT_ARTIFACT) || reference.contains(OBJECT_ARTIFACT_ENCODED)
}

/// Extract a generated filename from a corrupted reference
pub fn recover_filename(reference: &str) -> Option<String> {
    GENERATED_FILENAME.find(reference).map(|m| m.as_str().to_string())
}

/// True for .jpg/.jpeg/.png names (case-insensitive)
pub fn has_image_extension(name: &str) -> bool {
    IMAGE_EXTENSION.is_match(name)
}

/// Last path segment of a URI or path, with any `file://` prefix removed
pub fn extract_filename(reference: &str) -> &str {
    let without_scheme = reference.strip_prefix("file://").unwrap_or(reference);
    without_scheme.rsplit('/').next().unwrap_or(without_scheme)
}

/// Reduce a stored reference to the bare filename it should be persisted as
///
/// Returns `None` when nothing usable can be recovered.
pub fn to_stored_filename(reference: &str) -> Option<String> {
    if reference.is_empty() {
        return None;
    }
    if is_corrupted(reference) {
        return recover_filename(reference);
    }
    if !reference.contains('/') && !reference.contains("://") {
        return Some(reference.to_string());
    }

    let filename = extract_filename(reference);
    if has_image_extension(filename) {
        Some(filename.to_string())
    } else {
        None
    }
}

/// The platform's persistent document directory, as seen by this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDir {
    root: PathBuf,
    /// `file://<root>/`
    uri_prefix: String,
}

impl DocumentDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut uri_prefix = format!("file://{}", root.to_string_lossy());
        if !uri_prefix.ends_with('/') {
            uri_prefix.push('/');
        }
        Self { root, uri_prefix }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `file://` URI for a filename in this directory
    pub fn uri_for(&self, filename: &str) -> String {
        format!("{}{}", self.uri_prefix, filename)
    }

    /// Filesystem path for a filename in this directory
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Normalize any image reference into a URI usable by the image widget
    ///
    /// Handles bare filenames, stringified-object artifacts, absolute paths
    /// from older containers and `file://` URIs. Applying it to its own output
    /// returns the same value.
    pub fn ensure_image_uri(&self, reference: &str) -> String {
        let reference = reference.trim();
        if reference.is_empty() {
            return String::new();
        }

        if is_corrupted(reference) {
            return match recover_filename(reference) {
                Some(filename) => {
                    tracing::warn!("🔧 Recovered {} from corrupted reference", filename);
                    self.uri_for(&filename)
                }
                None => {
                    tracing::error!("❌ Could not recover image reference: {}", reference);
                    String::new()
                }
            };
        }

        if reference.starts_with(&self.uri_prefix) {
            return reference.to_string();
        }

        let is_remote = reference.contains("://") && !reference.starts_with("file://");
        if is_remote {
            return reference.to_string();
        }

        let filename = extract_filename(reference);

        // Bare filename, or a generated capture name anywhere in a local path
        if has_image_extension(filename) {
            return self.uri_for(filename);
        }

        // Local non-image path: just make it a URI
        if let Some(path) = reference.strip_prefix("file://") {
            return format!("file://{}", path);
        }
        if reference.starts_with('/') {
            return format!("file://{}", reference);
        }

        reference.to_string()
    }

    /// Filesystem path for any reference, via `ensure_image_uri`
    pub fn to_path(&self, reference: &str) -> Option<PathBuf> {
        let uri = self.ensure_image_uri(reference);
        uri.strip_prefix("file://").map(PathBuf::from)
    }

    /// Two references point at the same image
    pub fn same_image(&self, a: &str, b: &str) -> bool {
        let a = self.ensure_image_uri(a);
        !a.is_empty() && a == self.ensure_image_uri(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> DocumentDir {
        DocumentDir::new("/data/haven/documents")
    }

    #[test]
    fn test_bare_filename() {
        assert_eq!(
            docs().ensure_image_uri("furniture_scene_1700000000000.jpg"),
            "file:///data/haven/documents/furniture_scene_1700000000000.jpg"
        );
    }

    #[test]
    fn test_corrupted_reference() {
        let d = docs();
        assert_eq!(
            d.ensure_image_uri("file:///x/[object Object]/room_scan_12.jpg"),
            d.uri_for("room_scan_12.jpg")
        );
        assert_eq!(
            d.ensure_image_uri("%5Bobject%20Object%5Dimage_77.jpg"),
            d.uri_for("image_77.jpg")
        );
        assert_eq!(d.ensure_image_uri("[object Object]"), "");
    }

    #[test]
    fn test_stale_container_path() {
        let d = docs();
        let stale = "/var/mobile/Containers/Data/Application/OLD-ID/Documents/image_5.jpg";
        assert_eq!(d.ensure_image_uri(stale), d.uri_for("image_5.jpg"));
        assert_eq!(
            d.ensure_image_uri(&format!("file://{}", stale)),
            d.uri_for("image_5.jpg")
        );
    }

    #[test]
    fn test_current_directory_uri_untouched() {
        let d = docs();
        let uri = d.uri_for("demo_greg_1.jpg");
        assert_eq!(d.ensure_image_uri(&uri), uri);
    }

    #[test]
    fn test_non_image_paths() {
        let d = docs();
        assert_eq!(d.ensure_image_uri("/tmp/notes.txt"), "file:///tmp/notes.txt");
        assert_eq!(d.ensure_image_uri("https://example.com/a.png"), "https://example.com/a.png");
        assert_eq!(d.ensure_image_uri(""), "");
    }

    #[test]
    fn test_ensure_image_uri_is_idempotent() {
        let d = docs();
        let inputs = [
            "image_1.jpg",
            "IMG.PNG",
            "file:///old/[object Object]furniture_scene_9.jpg",
            "[object Object]",
            "/var/mobile/Containers/Data/Application/A/Documents/room_scan_3.jpg",
            "file:///var/mobile/Containers/Data/Application/B/Documents/x.jpeg",
            "file:///data/haven/documents/image_2.jpg",
            "/tmp/notes.txt",
            "file:///tmp/notes.txt",
            "https://example.com/a.png",
            "relative/dir",
        ];
        for input in inputs {
            let once = d.ensure_image_uri(input);
            assert_eq!(d.ensure_image_uri(&once), once, "input: {}", input);
        }
    }

    #[test]
    fn test_to_stored_filename() {
        assert_eq!(to_stored_filename("image_1.jpg").as_deref(), Some("image_1.jpg"));
        assert_eq!(
            to_stored_filename("file:///a/b/Documents/furniture_scene_4.jpg").as_deref(),
            Some("furniture_scene_4.jpg")
        );
        assert_eq!(
            to_stored_filename("file:///[object Object]/image_8.jpg").as_deref(),
            Some("image_8.jpg")
        );
        assert_eq!(to_stored_filename("[object Object]"), None);
        assert_eq!(to_stored_filename("/a/b/readme.txt"), None);
        assert_eq!(to_stored_filename(""), None);
    }

    #[test]
    fn test_to_path_and_same_image() {
        let d = docs();
        assert_eq!(
            d.to_path("image_3.jpg"),
            Some(PathBuf::from("/data/haven/documents/image_3.jpg"))
        );
        assert!(d.same_image("image_3.jpg", "/old/Documents/image_3.jpg"));
        assert!(!d.same_image("", ""));
    }
}
