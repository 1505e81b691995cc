/// Shared data structures for the application state
///
/// These structs are the persisted model: they are serialized to JSON and
/// stored in the key-value table, so field names follow the stored format
/// (`createdAt`, `sharedWith`, `imageUri`, ...).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::demo::DemoProject;

/// Kinds of furniture the placer offers
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FurnitureKind {
    Chair,
    Table,
    Couch,
    Lamp,
    Art,
    Posters,
    Desk,
}

impl FurnitureKind {
    /// Picker order
    pub const ALL: [FurnitureKind; 7] = [
        FurnitureKind::Chair,
        FurnitureKind::Table,
        FurnitureKind::Couch,
        FurnitureKind::Lamp,
        FurnitureKind::Art,
        FurnitureKind::Posters,
        FurnitureKind::Desk,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FurnitureKind::Chair => "Chair",
            FurnitureKind::Table => "Table",
            FurnitureKind::Couch => "Couch",
            FurnitureKind::Lamp => "Lamp",
            FurnitureKind::Art => "Art",
            FurnitureKind::Posters => "Posters",
            FurnitureKind::Desk => "Desk",
        }
    }
}

impl std::fmt::Display for FurnitureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single piece of furniture placed in the scene
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlacedFurniture {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FurnitureKind,
    /// World position in meters, relative to the renderer's tracking origin
    pub position: [f64; 3],
    /// Euler rotation in degrees
    pub rotation: [f64; 3],
    /// Catalog variant (e.g. "couch-3.png")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// A saved project: a named collection of captured images plus sharing info
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedProject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Bare filenames, resolved against the current document directory on read
    #[serde(default)]
    pub images: Vec<String>,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_with: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_message: Option<String>,
    /// Stable demo identity; absent on user projects and on legacy records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo: Option<DemoProject>,
}

impl SavedProject {
    /// Which demo this project is, preferring the stored flag over the name
    pub fn demo_identity(&self) -> Option<DemoProject> {
        self.demo.or_else(|| DemoProject::from_name(&self.name))
    }
}

/// Fractional position on an image, both axes in [0, 1]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Build a position, clamping both axes into the image
    pub fn clamped(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// A comment on a project, optionally pinned to an image
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub message: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Single nested reply; a reply never carries its own reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<Box<Comment>>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub unread: bool,
}

impl Comment {
    /// A plain comment with no image, pin, or reply
    pub fn new(id: impl Into<String>, author: impl Into<String>, message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            message: message.into(),
            timestamp,
            image_uri: None,
            position: None,
            reply: None,
            resolved: false,
            unread: false,
        }
    }

    /// Attach a reply, flattening anything nested below it
    pub fn set_reply(&mut self, mut reply: Comment) {
        reply.reply = None;
        self.reply = Some(Box::new(reply));
    }

    /// Counted in badges and shown in listings
    pub fn is_active_unread(&self) -> bool {
        !self.resolved && self.unread
    }
}

/// Wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Short random suffix for generated ids
///
/// Ids are `<prefix>-<millis>-<suffix>`; collisions are not formally ruled out.
pub fn unique_suffix() -> String {
    let mut suffix = Uuid::new_v4().simple().to_string();
    suffix.truncate(8);
    suffix
}
