use image::{imageops::FilterType, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::state::data::{FurnitureKind, PlacedFurniture};

/// Size of generated thumbnails (square)
const THUMBNAIL_SIZE: u32 = 256;

/// Dimensions of the stand-in scene preview
const PREVIEW_WIDTH: u32 = 640;
const PREVIEW_HEIGHT: u32 = 480;

/// Pixels per meter at one meter from the camera
const FOCAL_PX: f64 = 240.0;

/// Generate a thumbnail for an image in the document directory
/// Returns the path to the cached thumbnail, or None if generation failed
pub fn generate_thumbnail(source: &Path, cache_dir: &Path) -> Option<PathBuf> {
    let filename = source.file_name()?.to_string_lossy().to_string();
    let thumbnail_path = cache_dir.join(&filename);
    if thumbnail_path == source {
        tracing::warn!("❌ Thumbnail cache overlaps source: {}", source.display());
        return None;
    }

    // Reuse a cached thumbnail that is at least as new as its source
    if is_fresh(&thumbnail_path, source) {
        return Some(thumbnail_path);
    }

    let img = match image::open(source) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!("❌ Could not decode {}: {}", source.display(), e);
            return None;
        }
    };

    let thumbnail = img.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);

    fs::create_dir_all(cache_dir).ok()?;
    if let Err(e) = thumbnail.save(&thumbnail_path) {
        tracing::warn!("❌ Could not save thumbnail {}: {}", thumbnail_path.display(), e);
        return None;
    }

    tracing::debug!("📸 Generated thumbnail: {}", thumbnail_path.display());
    Some(thumbnail_path)
}

fn is_fresh(thumbnail: &Path, source: &Path) -> bool {
    let (Ok(thumb_meta), Ok(source_meta)) = (fs::metadata(thumbnail), fs::metadata(source)) else {
        return false;
    };
    match (thumb_meta.modified(), source_meta.modified()) {
        (Ok(t), Ok(s)) => t >= s,
        _ => false,
    }
}

/// Render a flat preview of the scene and save it as a JPEG
///
/// This is the desktop stand-in for the camera feed: a wall, a floor and a
/// box for the placed furniture, projected from its world position.
pub fn render_scene_preview(furniture: Option<&PlacedFurniture>, dest: &Path) -> Result<()> {
    let mut img = RgbImage::new(PREVIEW_WIDTH, PREVIEW_HEIGHT);
    let horizon = PREVIEW_HEIGHT * 3 / 5;

    for (_, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = if y < horizon {
            Rgb([222, 214, 200])
        } else {
            // Floor gets darker towards the camera
            let t = (y - horizon) as f32 / (PREVIEW_HEIGHT - horizon) as f32;
            let shade = (168.0 - 48.0 * t) as u8;
            Rgb([shade, (shade as f32 * 0.8) as u8, (shade as f32 * 0.6) as u8])
        };
    }

    if let Some(f) = furniture {
        draw_furniture(&mut img, f);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    img.save(dest)?;
    Ok(())
}

/// Footprint (width, height) in meters and color for each kind
fn appearance(kind: FurnitureKind) -> (f64, f64, Rgb<u8>) {
    match kind {
        FurnitureKind::Chair => (0.5, 0.9, Rgb([139, 92, 246])),
        FurnitureKind::Table => (1.2, 0.75, Rgb([120, 84, 52])),
        FurnitureKind::Couch => (2.0, 0.9, Rgb([70, 110, 150])),
        FurnitureKind::Lamp => (0.3, 1.6, Rgb([240, 200, 90])),
        FurnitureKind::Art => (0.8, 1.0, Rgb([200, 70, 70])),
        FurnitureKind::Posters => (0.6, 0.8, Rgb([60, 160, 120])),
        FurnitureKind::Desk => (1.4, 0.75, Rgb([90, 90, 90])),
    }
}

fn draw_furniture(img: &mut RgbImage, f: &PlacedFurniture) {
    let [x, y, z] = f.position;
    // Negative z is in front of the camera
    let depth = (-z).max(0.5);
    let scale = FOCAL_PX / depth;
    let (width_m, height_m, color) = appearance(f.kind);

    let center_x = PREVIEW_WIDTH as f64 / 2.0 + x * scale;
    let base_y = PREVIEW_HEIGHT as f64 * 0.8 - y * scale;
    let half_w = width_m * scale / 2.0;
    let h = height_m * scale;

    let left = (center_x - half_w).max(0.0) as u32;
    let right = ((center_x + half_w).max(0.0) as u32).min(PREVIEW_WIDTH);
    let top = (base_y - h).max(0.0) as u32;
    let bottom = (base_y.max(0.0) as u32).min(PREVIEW_HEIGHT);

    for py in top..bottom {
        for px in left..right {
            img.put_pixel(px, py, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chair_at(position: [f64; 3]) -> PlacedFurniture {
        PlacedFurniture {
            id: "furniture-1".to_string(),
            kind: FurnitureKind::Chair,
            position,
            rotation: [0.0; 3],
            variant: None,
        }
    }

    #[test]
    fn test_render_preview_and_thumbnail() {
        let tmp = tempfile::tempdir().unwrap();
        let scene = tmp.path().join("documents").join("furniture_scene_1.jpg");
        render_scene_preview(Some(&chair_at([0.0, 0.5, -1.0])), &scene).unwrap();

        let decoded = image::open(&scene).unwrap();
        assert_eq!(decoded.width(), PREVIEW_WIDTH);

        let thumb = generate_thumbnail(&scene, &tmp.path().join("thumbs")).unwrap();
        let thumb_img = image::open(&thumb).unwrap();
        assert!(thumb_img.width() <= THUMBNAIL_SIZE && thumb_img.height() <= THUMBNAIL_SIZE);

        // Second call hits the cache
        assert_eq!(generate_thumbnail(&scene, &tmp.path().join("thumbs")), Some(thumb));
    }

    #[test]
    fn test_far_offscreen_furniture_does_not_panic() {
        let tmp = tempfile::tempdir().unwrap();
        let scene = tmp.path().join("s.jpg");
        render_scene_preview(Some(&chair_at([50.0, -20.0, 3.0])), &scene).unwrap();
        render_scene_preview(None, &scene).unwrap();
    }

    #[test]
    fn test_thumbnail_of_garbage_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = tmp.path().join("image_1.jpg");
        fs::write(&bad, b"not a jpeg").unwrap();
        assert_eq!(generate_thumbnail(&bad, &tmp.path().join("thumbs")), None);
    }

    #[test]
    fn test_thumbnail_never_overwrites_its_source() {
        let tmp = tempfile::tempdir().unwrap();
        let scene = tmp.path().join("scene.jpg");
        render_scene_preview(None, &scene).unwrap();
        let before = fs::read(&scene).unwrap();

        assert_eq!(generate_thumbnail(&scene, tmp.path()), None);
        assert_eq!(fs::read(&scene).unwrap(), before);
    }
}
