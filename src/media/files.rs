/// Image files in the persistent document directory
///
/// Captures arrive in ephemeral locations (temp files from the renderer, a
/// picked photo). They are copied here under generated names and only the
/// filename is handed back for storage.

use std::fs;
use std::path::Path;

use super::uri::DocumentDir;
use crate::error::{HavenError, Result};

/// `furniture_scene_<millis>.jpg`: a capture from the furniture placer
pub fn scene_filename(millis: i64) -> String {
    format!("furniture_scene_{}.jpg", millis)
}

/// `room_scan_<millis>.jpg`: a capture from the room scanner
pub fn room_scan_filename(millis: i64) -> String {
    format!("room_scan_{}.jpg", millis)
}

/// `image_<millis>.jpg`: any other imported image
pub fn image_filename(millis: i64) -> String {
    format!("image_{}.jpg", millis)
}

/// Copy an ephemeral image into the document directory
///
/// Returns the filename to persist. When `filename` is `None` a generic
/// `image_<millis>.jpg` name is generated.
pub fn save_image_file(
    docs: &DocumentDir,
    source: &Path,
    filename: Option<&str>,
    now_ms: i64,
) -> Result<String> {
    let filename = match filename {
        Some(name) => name.to_string(),
        None => image_filename(now_ms),
    };

    if filename.contains('/') || filename.contains('\\') {
        return Err(HavenError::InvalidInput(format!(
            "image filename must not contain a path: {}",
            filename
        )));
    }

    fs::create_dir_all(docs.root())?;
    let dest = docs.path_for(&filename);

    tracing::info!("📸 Saving image: {} -> {}", source.display(), dest.display());
    fs::copy(source, &dest)?;

    if !dest.exists() {
        return Err(HavenError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file was not created after copy: {}", dest.display()),
        )));
    }

    Ok(filename)
}

/// Whether a stored reference resolves to an existing file
pub fn image_file_exists(docs: &DocumentDir, reference: &str) -> bool {
    docs.to_path(reference).map(|p| p.is_file()).unwrap_or(false)
}

/// Delete the file behind a stored reference
///
/// A reference that resolves to nothing, or to a file that is already gone,
/// is not an error.
pub fn delete_image_file(docs: &DocumentDir, reference: &str) -> Result<()> {
    let Some(path) = docs.to_path(reference) else {
        return Ok(());
    };

    match fs::remove_file(&path) {
        Ok(()) => {
            tracing::info!("🗑️  Deleted image file: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Copy a bundled asset into the document directory, replacing any old copy
pub fn copy_bundled_asset(docs: &DocumentDir, source: &Path, filename: &str) -> Result<String> {
    fs::create_dir_all(docs.root())?;
    let dest = docs.path_for(filename);

    if dest.exists() {
        fs::remove_file(&dest)?;
    }
    fs::copy(source, &dest)?;

    Ok(filename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names() {
        assert_eq!(scene_filename(12), "furniture_scene_12.jpg");
        assert_eq!(room_scan_filename(3), "room_scan_3.jpg");
        assert_eq!(image_filename(9), "image_9.jpg");
    }

    #[test]
    fn test_save_and_delete_image() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = DocumentDir::new(tmp.path().join("documents"));
        let capture = tmp.path().join("capture.tmp");
        fs::write(&capture, b"jpeg bytes").unwrap();

        let name = save_image_file(&docs, &capture, None, 1_700_000_000_000).unwrap();
        assert_eq!(name, "image_1700000000000.jpg");
        assert!(image_file_exists(&docs, &name));

        // A stale absolute path still resolves to the current file
        let stale = format!("/var/mobile/Containers/OLD/Documents/{}", name);
        assert!(image_file_exists(&docs, &stale));

        delete_image_file(&docs, &stale).unwrap();
        assert!(!image_file_exists(&docs, &name));

        // Deleting again is fine
        delete_image_file(&docs, &name).unwrap();
        delete_image_file(&docs, "[object Object]").unwrap();
    }

    #[test]
    fn test_save_rejects_paths_in_filename() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = DocumentDir::new(tmp.path());
        let capture = tmp.path().join("c.tmp");
        fs::write(&capture, b"x").unwrap();

        let err = save_image_file(&docs, &capture, Some("../escape.jpg"), 0).unwrap_err();
        assert!(matches!(err, HavenError::InvalidInput(_)));
    }

    #[test]
    fn test_save_missing_source_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = DocumentDir::new(tmp.path());
        let result = save_image_file(&docs, &tmp.path().join("nope.jpg"), Some("image_1.jpg"), 0);
        assert!(matches!(result, Err(HavenError::Io(_))));
    }

    #[test]
    fn test_copy_bundled_asset_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = DocumentDir::new(tmp.path().join("documents"));
        let asset = tmp.path().join("greg-1.jpg");

        fs::write(&asset, b"v1").unwrap();
        copy_bundled_asset(&docs, &asset, "demo_greg_1.jpg").unwrap();
        fs::write(&asset, b"v2").unwrap();
        copy_bundled_asset(&docs, &asset, "demo_greg_1.jpg").unwrap();

        assert_eq!(fs::read(docs.path_for("demo_greg_1.jpg")).unwrap(), b"v2");
    }
}
