use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::data::{unique_suffix, SavedProject};
use super::demo::DemoProject;
use super::store::{
    JsonStore, KvStore, COMMENTS_KEY_PREFIX, CURRENT_PROJECT_DESCRIPTION_KEY,
    CURRENT_PROJECT_NAME_KEY, SAVED_IMAGES_KEY, SAVED_PROJECTS_KEY,
};
use crate::error::{HavenError, Result};
use crate::media::files::{copy_bundled_asset, delete_image_file, image_file_exists};
use crate::media::uri::{is_corrupted, to_stored_filename, DocumentDir};

/// Fields supplied when a capture session is saved as a project
#[derive(Debug, Clone, Default)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    pub shared_with: Vec<String>,
    pub share_message: Option<String>,
}

/// Mutable fields of an existing project
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: String,
    pub description: String,
    pub shared_with: Vec<String>,
    pub share_message: Option<String>,
}

/// Split a comma separated recipient field into trimmed, non-empty entries
pub fn parse_recipients(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Name and description of the in-progress project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftInfo {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Where a fresh capture should be recorded
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureTarget {
    /// The in-progress gallery of a new project
    Gallery,
    /// An existing saved project
    Project(String),
}

/// Outcome of the image reference migration pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// References rewritten to a bare filename
    pub repaired: usize,
    /// References that could not be recovered and were removed
    pub dropped: usize,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        self.repaired > 0 || self.dropped > 0
    }
}

/// The Library manages saved projects, the in-progress gallery and their
/// image files. All state lives in the key-value store as JSON; image files
/// live in the document directory.
pub struct ProjectLibrary<S: KvStore> {
    store: S,
    docs: DocumentDir,
}

impl<S: KvStore> ProjectLibrary<S> {
    pub fn new(store: S, docs: DocumentDir) -> Self {
        Self { store, docs }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn docs(&self) -> &DocumentDir {
        &self.docs
    }

    // ========== Projects ==========

    /// Projects in stored order
    fn load_projects(&self) -> Result<Vec<SavedProject>> {
        Ok(self.store.get_json(SAVED_PROJECTS_KEY)?.unwrap_or_default())
    }

    fn save_projects(&self, projects: &[SavedProject]) -> Result<()> {
        self.store.set_json(SAVED_PROJECTS_KEY, projects)
    }

    /// All projects, newest first
    pub fn list_projects(&self) -> Result<Vec<SavedProject>> {
        let mut projects = self.load_projects()?;
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    pub fn get_project(&self, id: &str) -> Result<SavedProject> {
        self.load_projects()?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| HavenError::NotFound(format!("project {}", id)))
    }

    /// Append a new project. Names are not deduplicated.
    pub fn create_project(&self, draft: ProjectDraft, now_ms: i64) -> Result<SavedProject> {
        let project = SavedProject {
            id: format!("project-{}-{}", now_ms, unique_suffix()),
            name: draft.name.trim().to_string(),
            description: draft.description.trim().to_string(),
            images: draft.images,
            created_at: now_ms,
            shared_with: non_empty(draft.shared_with),
            share_message: trimmed(draft.share_message),
            demo: None,
        };

        let mut projects = self.load_projects()?;
        projects.push(project.clone());
        self.save_projects(&projects)?;

        tracing::info!("✅ Saved project: {} ({} images)", project.name, project.images.len());
        Ok(project)
    }

    /// Replace name, description and sharing info. Images are left alone.
    pub fn update_project(&self, id: &str, update: ProjectUpdate) -> Result<SavedProject> {
        let name = update.name.trim();
        if name.is_empty() {
            return Err(HavenError::InvalidInput("project name is required".to_string()));
        }

        let mut projects = self.load_projects()?;
        let project = projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| HavenError::NotFound(format!("project {}", id)))?;

        project.name = name.to_string();
        project.description = update.description.trim().to_string();
        project.shared_with = non_empty(update.shared_with);
        project.share_message = trimmed(update.share_message);
        let updated = project.clone();

        self.save_projects(&projects)?;
        Ok(updated)
    }

    /// Remove a project and its comment thread. Image files are kept.
    pub fn delete_project(&self, id: &str) -> Result<()> {
        let mut projects = self.load_projects()?;
        let before = projects.len();
        projects.retain(|p| p.id != id);
        if projects.len() == before {
            return Err(HavenError::NotFound(format!("project {}", id)));
        }

        self.save_projects(&projects)?;
        self.store.remove(&format!("{}{}", COMMENTS_KEY_PREFIX, id))?;

        tracing::info!("🗑️  Deleted project {}", id);
        Ok(())
    }

    pub fn add_image_to_project(&self, id: &str, filename: &str) -> Result<SavedProject> {
        let mut projects = self.load_projects()?;
        let project = projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| HavenError::NotFound(format!("project {}", id)))?;

        project.images.push(filename.to_string());
        let updated = project.clone();

        self.save_projects(&projects)?;
        Ok(updated)
    }

    /// Remove one image reference from a project and delete its file
    pub fn delete_project_image(&self, id: &str, reference: &str) -> Result<SavedProject> {
        let mut projects = self.load_projects()?;
        let project = projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| HavenError::NotFound(format!("project {}", id)))?;

        if let Err(e) = delete_image_file(&self.docs, reference) {
            tracing::error!("⚠️  Error deleting image file {}: {}", reference, e);
        }

        let docs = &self.docs;
        project
            .images
            .retain(|image| image != reference && !docs.same_image(image, reference));
        let updated = project.clone();

        self.save_projects(&projects)?;
        Ok(updated)
    }

    /// Record a fresh capture either in the gallery or on a saved project
    pub fn record_capture(&self, target: &CaptureTarget, filename: &str) -> Result<()> {
        match target {
            CaptureTarget::Gallery => self.add_gallery_image(filename).map(|_| ()),
            CaptureTarget::Project(id) => self.add_image_to_project(id, filename).map(|_| ()),
        }
    }

    // ========== In-progress gallery ==========

    pub fn gallery_images(&self) -> Result<Vec<String>> {
        Ok(self.store.get_json(SAVED_IMAGES_KEY)?.unwrap_or_default())
    }

    pub fn add_gallery_image(&self, filename: &str) -> Result<Vec<String>> {
        let mut images = self.gallery_images()?;
        images.push(filename.to_string());
        self.store.set_json(SAVED_IMAGES_KEY, &images)?;
        Ok(images)
    }

    /// Remove an image from the gallery and delete its file
    pub fn delete_gallery_image(&self, reference: &str) -> Result<Vec<String>> {
        if let Err(e) = delete_image_file(&self.docs, reference) {
            tracing::error!("⚠️  Error deleting image file {}: {}", reference, e);
        }

        let mut images = self.gallery_images()?;
        images.retain(|image| image != reference);
        self.store.set_json(SAVED_IMAGES_KEY, &images)?;
        Ok(images)
    }

    /// Start a new project with an empty gallery
    pub fn clear_gallery(&self) -> Result<()> {
        self.store.set_json(SAVED_IMAGES_KEY, &Vec::<String>::new())
    }

    // ========== Draft info ==========

    pub fn set_draft_info(&self, name: &str, description: &str) -> Result<()> {
        self.store.set(CURRENT_PROJECT_NAME_KEY, name)?;
        self.store.set(CURRENT_PROJECT_DESCRIPTION_KEY, description)
    }

    pub fn draft_info(&self) -> Result<DraftInfo> {
        Ok(DraftInfo {
            name: self.store.get(CURRENT_PROJECT_NAME_KEY)?,
            description: self.store.get(CURRENT_PROJECT_DESCRIPTION_KEY)?,
        })
    }

    pub fn clear_draft_info(&self) -> Result<()> {
        self.store.remove(CURRENT_PROJECT_NAME_KEY)?;
        self.store.remove(CURRENT_PROJECT_DESCRIPTION_KEY)
    }

    /// Save the gallery as a project, then clear the gallery and draft info
    ///
    /// Nothing is saved while the gallery is empty.
    pub fn finalize_gallery(
        &self,
        shared_with: Vec<String>,
        share_message: Option<String>,
        now_ms: i64,
    ) -> Result<Option<SavedProject>> {
        let images = self.gallery_images()?;
        if images.is_empty() {
            return Ok(None);
        }

        let draft_info = self.draft_info()?;
        let name = draft_info
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_project_name(now_ms));

        let project = self.create_project(
            ProjectDraft {
                name,
                description: draft_info.description.unwrap_or_default(),
                images,
                shared_with,
                share_message,
            },
            now_ms,
        )?;

        self.clear_gallery()?;
        self.clear_draft_info()?;
        Ok(Some(project))
    }

    // ========== Demo seeding ==========

    /// Create or refresh both demo projects from the bundled images
    ///
    /// Runs on every start. Demo images are copied again so they survive
    /// reinstalls; demo records keep their id and creation time but have
    /// their metadata and image list overwritten.
    pub fn seed_demo_projects(&self, asset_dir: &Path, now_ms: i64) -> Result<()> {
        let mut projects = self.load_projects()?;

        for demo in DemoProject::ALL {
            let images = self.copy_demo_images(demo, asset_dir);

            let existing = projects
                .iter()
                .position(|p| p.demo == Some(demo))
                .or_else(|| {
                    projects
                        .iter()
                        .position(|p| p.demo.is_none() && DemoProject::from_name(&p.name) == Some(demo))
                });

            match existing {
                Some(index) => {
                    let project = &mut projects[index];
                    project.name = demo.name().to_string();
                    project.description = demo.description().to_string();
                    project.images = images;
                    project.shared_with = Some(demo.recipients().iter().map(|r| r.to_string()).collect());
                    project.share_message = Some(demo.share_message().to_string());
                    project.demo = Some(demo);
                }
                None => projects.push(SavedProject {
                    id: format!("project-{}-{}", now_ms, demo.bundle_prefix()),
                    name: demo.name().to_string(),
                    description: demo.description().to_string(),
                    images,
                    created_at: now_ms - demo.created_age_ms(),
                    shared_with: Some(demo.recipients().iter().map(|r| r.to_string()).collect()),
                    share_message: Some(demo.share_message().to_string()),
                    demo: Some(demo),
                }),
            }
        }

        self.save_projects(&projects)?;
        tracing::info!("🏠 Demo projects ready");
        Ok(())
    }

    /// Copy `<prefix>-<n>.jpg` bundle images to `demo_<prefix>_<n>.jpg`
    fn copy_demo_images(&self, demo: DemoProject, asset_dir: &Path) -> Vec<String> {
        let mut copied = Vec::new();
        for (index, source) in bundled_demo_images(asset_dir, demo).iter().enumerate() {
            let filename = demo.image_filename(index + 1);
            match copy_bundled_asset(&self.docs, source, &filename) {
                Ok(name) => copied.push(name),
                Err(e) => tracing::error!("⚠️  Error copying bundled asset {}: {}", filename, e),
            }
        }
        copied
    }

    // ========== Maintenance ==========

    /// Rewrite stored image references as bare filenames
    ///
    /// Corrupted references are repaired when a generated filename can be
    /// recovered and dropped otherwise. Keys are only rewritten when
    /// something changed.
    pub fn migrate_project_images(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        let mut projects = self.load_projects()?;
        let mut projects_changed = false;
        for project in &mut projects {
            let (images, changes) = migrate_references(&project.images);
            if changes.changed() {
                project.images = images;
                projects_changed = true;
                report.repaired += changes.repaired;
                report.dropped += changes.dropped;
            }
        }
        if projects_changed {
            self.save_projects(&projects)?;
            tracing::info!("✅ Migrated project images to filename-only format");
        }

        let gallery = self.gallery_images()?;
        let (images, changes) = migrate_references(&gallery);
        if changes.changed() {
            self.store.set_json(SAVED_IMAGES_KEY, &images)?;
            report.repaired += changes.repaired;
            report.dropped += changes.dropped;
            tracing::info!("✅ Migrated saved images to filename-only format");
        }

        Ok(report)
    }

    /// Drop project image references whose files are gone
    ///
    /// Disabled unless `enabled` is set: a false negative would silently
    /// remove a user's image.
    pub fn cleanup_missing_images(&self, enabled: bool) -> Result<usize> {
        if !enabled {
            return Ok(0);
        }

        let mut projects = self.load_projects()?;
        let mut removed = 0;
        for project in &mut projects {
            let before = project.images.len();
            project.images.retain(|image| image_file_exists(&self.docs, image));
            removed += before - project.images.len();
        }

        if removed > 0 {
            self.save_projects(&projects)?;
            tracing::warn!("🧹 Removed {} missing image references", removed);
        }
        Ok(removed)
    }
}

/// Bundled images for a demo, ordered by their number
fn bundled_demo_images(asset_dir: &Path, demo: DemoProject) -> Vec<PathBuf> {
    let prefix = format!("{}-", demo.bundle_prefix());
    let mut found: Vec<(u32, PathBuf)> = WalkDir::new(asset_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_lowercase();
            let number = name.strip_prefix(&prefix)?.strip_suffix(".jpg")?.parse::<u32>().ok()?;
            Some((number, e.into_path()))
        })
        .collect();

    found.sort_by_key(|(n, _)| *n);
    found.into_iter().map(|(_, path)| path).collect()
}

fn migrate_references(images: &[String]) -> (Vec<String>, MigrationReport) {
    let mut report = MigrationReport::default();
    let mut migrated = Vec::with_capacity(images.len());

    for image in images {
        match to_stored_filename(image) {
            Some(filename) => {
                if &filename != image {
                    if is_corrupted(image) {
                        tracing::info!("🔧 Fixing corrupted URI: {}", image);
                    }
                    report.repaired += 1;
                }
                migrated.push(filename);
            }
            None => report.dropped += 1,
        }
    }

    (migrated, report)
}

fn non_empty(list: Vec<String>) -> Option<Vec<String>> {
    if list.is_empty() {
        None
    } else {
        Some(list)
    }
}

fn trimmed(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// `New Project <m/d/yyyy>` in local time
fn default_project_name(now_ms: i64) -> String {
    let date = DateTime::from_timestamp_millis(now_ms)
        .map(|d| d.with_timezone(&Local).format("%-m/%-d/%Y").to_string())
        .unwrap_or_default();
    format!("New Project {}", date)
}
