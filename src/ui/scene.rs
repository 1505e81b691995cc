use std::path::{Path, PathBuf};

use crate::error::{HavenError, Result};
use crate::media::snapshot::render_scene_preview;
use crate::state::data::{now_millis, PlacedFurniture};
use crate::state::placement::SceneRenderer;

/// Desktop stand-in for the AR view
///
/// Every remount renders a fresh still of the scene into the scratch
/// directory; the view shows the mask image while one is up.
#[derive(Debug, Clone)]
pub struct PreviewRenderer {
    scene_dir: PathBuf,
    /// Latest rendered frame
    frame: Option<PathBuf>,
    /// Snapshot covering the view during a remount
    mask: Option<PathBuf>,
}

impl PreviewRenderer {
    pub fn new(scene_dir: PathBuf) -> Self {
        Self {
            scene_dir,
            frame: None,
            mask: None,
        }
    }

    /// What the view should display right now
    pub fn visible_frame(&self) -> Option<&Path> {
        self.mask.as_deref().or(self.frame.as_deref())
    }
}

impl SceneRenderer for PreviewRenderer {
    fn is_ready(&self) -> bool {
        self.scene_dir.is_dir()
    }

    fn capture_snapshot(&mut self) -> Result<PathBuf> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| HavenError::NotFound("no scene frame rendered yet".to_string()))?;

        let snapshot = self.scene_dir.join(format!("snapshot-{}.jpg", now_millis()));
        std::fs::copy(frame, &snapshot)?;
        Ok(snapshot)
    }

    fn remount(&mut self, generation: u64, furniture: Option<&PlacedFurniture>) {
        let frame = self.scene_dir.join(format!("scene-{}.jpg", generation));
        match render_scene_preview(furniture, &frame) {
            Ok(()) => {
                if let Some(old) = self.frame.replace(frame) {
                    let _ = std::fs::remove_file(old);
                }
            }
            Err(e) => tracing::error!("⚠️  Failed to render scene {}: {}", generation, e),
        }
    }

    fn show_mask(&mut self, snapshot: &Path) {
        self.mask = Some(snapshot.to_path_buf());
    }

    fn hide_mask(&mut self) {
        if let Some(mask) = self.mask.take() {
            let _ = std::fs::remove_file(mask);
        }
    }
}

/// Rough floor hit for a tap at a fractional view position
///
/// Taps near the bottom of the view land close to the camera, taps near
/// the horizon up to two meters away.
pub fn surface_point(x: f32, y: f32) -> [f64; 3] {
    let x = f64::from(x.clamp(0.0, 1.0));
    let y = f64::from(y.clamp(0.0, 1.0));
    let distance = (1.0 - y) * 2.0;
    [(x - 0.5) * (1.0 + distance), 0.0, -distance]
}
