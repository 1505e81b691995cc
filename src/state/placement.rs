/// Furniture placement and scene reconciliation
///
/// The scene renderer cannot apply incremental updates: every structural
/// change (placing, moving, removing) needs a full remount, and a remount
/// resets tracking and flashes. To hide the flash, a snapshot of the current
/// view is shown as a mask until the remounted scene has settled.
///
/// Time is passed in explicitly as monotonic milliseconds, so the timeline is
/// driven by the UI tick and fully deterministic under test.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data::{now_millis, unique_suffix, FurnitureKind, PlacedFurniture};
use crate::error::{HavenError, Result};
use crate::media::files::{save_image_file, scene_filename};
use crate::media::uri::DocumentDir;

/// Surface hits are at floor level: lift the piece by this much (meters)
pub const SURFACE_LIFT: f64 = 0.5;
/// ...and push it this far away from the camera (meters, along -z)
pub const SURFACE_PUSH_BACK: f64 = 1.0;
/// Step for up/down/left/right moves (meters)
pub const MOVE_STEP: f64 = 0.2;
/// Step for forward/backward moves (meters)
pub const DEPTH_STEP: f64 = 0.6;

/// Time for the remounted scene to come up
pub const SETTLE_MS: u64 = 500;
/// Extra time before the mask is lifted
pub const EXTRA_SETTLE_MS: u64 = 400;
/// Rapid moves within this window share one remount
pub const MOVE_DEBOUNCE_MS: u64 = 100;

/// Total time the mask stays up after a remount
pub const MASK_HOLD_MS: u64 = SETTLE_MS + EXTRA_SETTLE_MS;

/// The external scene renderer (AR view or its desktop stand-in)
pub trait SceneRenderer {
    /// Native side finished initializing
    fn is_ready(&self) -> bool;
    /// Capture the current view to a temporary image file
    fn capture_snapshot(&mut self) -> Result<PathBuf>;
    /// Tear down and rebuild the scene with the given content
    fn remount(&mut self, generation: u64, furniture: Option<&PlacedFurniture>);
    /// Cover the view with a still image
    fn show_mask(&mut self, snapshot: &Path);
    /// Remove the still image
    fn hide_mask(&mut self);
}

/// Direction of a nudge from the move controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
    Left,
    Right,
    /// Toward the camera
    Forward,
    /// Away from the camera
    Backward,
}

impl MoveDirection {
    /// Translation applied for one press
    pub fn delta(&self) -> [f64; 3] {
        match self {
            MoveDirection::Up => [0.0, MOVE_STEP, 0.0],
            MoveDirection::Down => [0.0, -MOVE_STEP, 0.0],
            MoveDirection::Left => [-MOVE_STEP, 0.0, 0.0],
            MoveDirection::Right => [MOVE_STEP, 0.0, 0.0],
            MoveDirection::Forward => [0.0, 0.0, -DEPTH_STEP],
            MoveDirection::Backward => [0.0, 0.0, DEPTH_STEP],
        }
    }
}

/// The piece chosen in the picker, waiting for a surface tap
#[derive(Debug, Clone, PartialEq)]
pub struct FurnitureSelection {
    pub kind: FurnitureKind,
    pub variant: Option<String>,
}

/// Result of a surface tap
#[derive(Debug, Clone, PartialEq)]
pub enum TapOutcome {
    /// Nothing was selected in the picker
    Ignored,
    /// A piece is already in the scene; the user must remove it first
    OnePieceOnly,
    Placed(PlacedFurniture),
}

/// Something the timeline did during `poll`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    Remounted { generation: u64 },
    MaskHidden,
}

/// One masked remount in flight
#[derive(Debug, Clone)]
struct Transition {
    /// Pending (debounced) remount deadline
    remount_at: Option<u64>,
    /// Mask lift deadline, known once the remount happened
    hide_at: Option<u64>,
    /// Whether a snapshot mask is actually showing
    masked: bool,
    /// Open the edit controls on this piece when the transition ends
    select_on_finish: Option<String>,
}

/// Bounded retry for a renderer that is still initializing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 300,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given (0-based) failed attempt: doubling, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Poll the renderer until it is ready or the policy runs out
///
/// Returns the number of attempts it took.
pub async fn wait_until_ready<R: SceneRenderer + ?Sized>(renderer: &R, policy: &RetryPolicy) -> Result<u32> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        if renderer.is_ready() {
            return Ok(attempt + 1);
        }
        if attempt + 1 < attempts {
            tracing::debug!("⏳ Renderer not ready (attempt {}), retrying", attempt + 1);
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }
    }
    Err(HavenError::RendererNotReady { attempts })
}

/// Tracks the single piece of furniture in the scene and drives remounts
pub struct PlacementController<R: SceneRenderer> {
    renderer: R,
    placed: Option<PlacedFurniture>,
    selection: Option<FurnitureSelection>,
    /// Piece whose move/remove controls are open
    editing: Option<String>,
    /// Remount key; bumped on every structural change
    generation: u64,
    transition: Option<Transition>,
}

impl<R: SceneRenderer> PlacementController<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            placed: None,
            selection: None,
            editing: None,
            generation: 0,
            transition: None,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn placed(&self) -> Option<&PlacedFurniture> {
        self.placed.as_ref()
    }

    pub fn selection(&self) -> Option<&FurnitureSelection> {
        self.selection.as_ref()
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn scene_generation(&self) -> u64 {
        self.generation
    }

    /// A masked remount is still in progress
    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn mask_visible(&self) -> bool {
        self.transition.as_ref().is_some_and(|t| t.masked)
    }

    /// Choose a piece in the picker
    pub fn select_furniture(&mut self, kind: FurnitureKind, variant: Option<String>) {
        self.selection = Some(FurnitureSelection { kind, variant });
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Open or close the edit controls; only the placed piece can be edited
    pub fn set_editing(&mut self, id: Option<&str>) {
        self.editing = match (id, &self.placed) {
            (Some(id), Some(placed)) if placed.id == id => Some(id.to_string()),
            _ => None,
        };
    }

    /// Turn a surface tap into a placement
    pub fn handle_surface_tap(&mut self, point: [f64; 3], now: u64) -> TapOutcome {
        let Some(selection) = self.selection.take() else {
            return TapOutcome::Ignored;
        };

        if self.placed.is_some() {
            tracing::info!("🪑 Only one piece of furniture at a time");
            return TapOutcome::OnePieceOnly;
        }

        let masked = self.raise_mask();

        let furniture = PlacedFurniture {
            id: format!("furniture-{}-{}", now_millis(), unique_suffix()),
            kind: selection.kind,
            position: [point[0], point[1] + SURFACE_LIFT, point[2] - SURFACE_PUSH_BACK],
            rotation: [0.0, 0.0, 0.0],
            variant: selection.variant,
        };
        self.placed = Some(furniture.clone());

        self.remount();
        self.transition = Some(Transition {
            remount_at: None,
            hide_at: Some(now + MASK_HOLD_MS),
            masked,
            select_on_finish: Some(furniture.id.clone()),
        });

        tracing::info!("🪑 Placed {} at {:?}", furniture.kind, furniture.position);
        TapOutcome::Placed(furniture)
    }

    /// Nudge the placed piece; rapid presses share one remount
    ///
    /// Returns false when nothing is placed.
    pub fn move_furniture(&mut self, direction: MoveDirection, now: u64) -> bool {
        let Some(furniture) = self.placed.as_mut() else {
            return false;
        };

        let delta = direction.delta();
        for (axis, d) in furniture.position.iter_mut().zip(delta) {
            *axis += d;
        }

        let previous = self.transition.take();
        let masked = match &previous {
            Some(t) if t.masked => true,
            _ => self.raise_mask(),
        };

        self.transition = Some(Transition {
            remount_at: Some(now + MOVE_DEBOUNCE_MS),
            hide_at: None,
            masked,
            select_on_finish: previous.and_then(|t| t.select_on_finish),
        });
        true
    }

    /// Remove the placed piece and remount an empty scene
    pub fn remove_furniture(&mut self) -> Option<PlacedFurniture> {
        let removed = self.placed.take()?;

        if self.editing.as_deref() == Some(removed.id.as_str()) {
            self.editing = None;
        }
        self.cancel_pending();
        self.remount();

        tracing::info!("🗑️  Removed {}", removed.kind);
        Some(removed)
    }

    /// Advance the timeline to `now`
    pub fn poll(&mut self, now: u64) -> Vec<SceneEvent> {
        let mut events = Vec::new();

        if let Some(remount_at) = self.transition.as_ref().and_then(|t| t.remount_at) {
            if now >= remount_at {
                self.remount();
                if let Some(t) = self.transition.as_mut() {
                    t.remount_at = None;
                    t.hide_at = Some(now + MASK_HOLD_MS);
                }
                events.push(SceneEvent::Remounted { generation: self.generation });
            }
        }

        if let Some(hide_at) = self.transition.as_ref().and_then(|t| t.hide_at) {
            if now >= hide_at {
                if let Some(t) = self.transition.take() {
                    if t.masked {
                        self.renderer.hide_mask();
                    }
                    if let Some(id) = t.select_on_finish {
                        self.set_editing(Some(&id));
                    }
                }
                events.push(SceneEvent::MaskHidden);
            }
        }

        events
    }

    /// Drop any pending timeline work (scene teardown)
    pub fn cancel_pending(&mut self) {
        if let Some(t) = self.transition.take() {
            if t.masked {
                self.renderer.hide_mask();
            }
        }
    }

    /// Capture the current view into the document directory
    ///
    /// Returns the stored filename (`furniture_scene_<millis>.jpg`).
    pub fn capture_to_documents(&mut self, docs: &DocumentDir, wall_ms: i64) -> Result<String> {
        let snapshot = self.renderer.capture_snapshot()?;
        let filename = save_image_file(docs, &snapshot, Some(&scene_filename(wall_ms)), wall_ms)?;
        if let Err(e) = std::fs::remove_file(&snapshot) {
            tracing::debug!("Could not remove temporary capture {}: {}", snapshot.display(), e);
        }
        Ok(filename)
    }

    fn remount(&mut self) {
        self.generation += 1;
        self.renderer.remount(self.generation, self.placed.as_ref());
    }

    /// Best effort: a failed capture just means no mask
    fn raise_mask(&mut self) -> bool {
        match self.renderer.capture_snapshot() {
            Ok(path) => {
                self.renderer.show_mask(&path);
                true
            }
            Err(e) => {
                tracing::error!("⚠️  Error capturing snapshot: {}", e);
                false
            }
        }
    }
}

impl<R: SceneRenderer> Drop for PlacementController<R> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
