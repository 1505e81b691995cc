use iced::widget::{
    button, canvas, column, container, horizontal_space, image, row, scrollable, stack, text,
    text_input, Column, Row,
};
use iced::{Alignment, ContentFit, Element, Length, Subscription, Task, Theme};
use rfd::FileDialog;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod media;
mod state;
mod ui;

use config::Config;
use media::files::{room_scan_filename, save_image_file};
use media::snapshot::generate_thumbnail;
use media::uri::DocumentDir;
use state::comments::{conversation, is_own, CommentThread};
use state::data::{now_millis, FurnitureKind, SavedProject};
use state::placement::{wait_until_ready, MoveDirection, PlacementController, SceneRenderer, TapOutcome};
use state::projects::{parse_recipients, CaptureTarget, ProjectLibrary, ProjectUpdate};
use state::session::{clear_stored_comments_once, CommentSession};
use state::store::SqliteStore;
use ui::format::{format_comment_time, format_project_date};
use ui::pins::{Pin, TapOverlay};
use ui::scene::{surface_point, PreviewRenderer};

/// Size of the image area in the placer and the project viewer
const VIEW_WIDTH: f32 = 640.0;
const VIEW_HEIGHT: f32 = 480.0;

/// How often the placement timeline is advanced while a remount is in flight
const TICK_MS: u64 = 50;

/// Which screen is showing
#[derive(Debug, Clone, PartialEq)]
enum Screen {
    Projects,
    Project(String),
    Placer,
    Gallery,
}

/// Something waiting for the user to confirm its deletion
#[derive(Debug, Clone, PartialEq)]
enum PendingDelete {
    Project(String),
    Image(String),
    GalleryImage(String),
    Comment(String),
    /// Reply on the comment with this id
    Reply(String),
}

impl PendingDelete {
    fn prompt(&self) -> &'static str {
        match self {
            PendingDelete::Project(_) => "Delete this project? Its comments are deleted too.",
            PendingDelete::Image(_) => "Delete this photo from the project?",
            PendingDelete::GalleryImage(_) => "Remove this photo?",
            PendingDelete::Comment(_) => "Delete this comment?",
            PendingDelete::Reply(_) => "Delete this reply?",
        }
    }
}

/// Fields being edited on the project screen
#[derive(Debug, Clone, Default)]
struct ProjectEdit {
    name: String,
    description: String,
    /// Comma separated recipients
    shared_with: String,
    share_message: String,
}

impl ProjectEdit {
    fn from_project(project: &SavedProject) -> Self {
        Self {
            name: project.name.clone(),
            description: project.description.clone(),
            shared_with: project.shared_with.clone().unwrap_or_default().join(", "),
            share_message: project.share_message.clone().unwrap_or_default(),
        }
    }

    fn to_update(&self) -> ProjectUpdate {
        ProjectUpdate {
            name: self.name.clone(),
            description: self.description.clone(),
            shared_with: parse_recipients(&self.shared_with),
            share_message: Some(self.share_message.clone()),
        }
    }
}

/// Main application state
struct Haven {
    config: Config,
    /// Projects, gallery and images
    library: ProjectLibrary<SqliteStore>,
    /// Per-run comment state (reads, demo reset)
    session: CommentSession,
    placer: PlacementController<PreviewRenderer>,
    renderer_ready: bool,
    /// Origin of the monotonic placement clock
    started: Instant,
    screen: Screen,
    /// Status message to display to the user
    status: String,

    /// Project list with unread comment counts
    projects: Vec<(SavedProject, usize)>,
    gallery: Vec<String>,
    thumbnails: HashMap<String, PathBuf>,
    /// Where captures and imports are recorded
    capture_target: CaptureTarget,

    thread: Option<CommentThread>,
    selected_image: Option<String>,
    selected_comment: Option<String>,
    comment_draft: String,
    reply_draft: String,
    project_edit: Option<ProjectEdit>,
    /// Delete waiting for confirmation
    pending_delete: Option<PendingDelete>,

    draft_name: String,
    draft_description: String,
    share_with: String,
    share_message: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    Tick,
    RendererReady(Result<u32, String>),
    ThumbnailsReady(Vec<(String, PathBuf)>),

    ShowProjects,
    OpenProject(String),
    EditProject,
    EditNameChanged(String),
    EditDescriptionChanged(String),
    EditShareWithChanged(String),
    EditShareMessageChanged(String),
    SaveProjectEdits,
    CancelProjectEdits,
    StartNewProject,
    OpenPlacer(CaptureTarget),
    OpenGallery,
    ImportPhoto,

    SelectFurniture(FurnitureKind),
    ClearSelection,
    SurfaceTapped(f32, f32),
    MoveFurniture(MoveDirection),
    RemoveFurniture,
    CaptureScene,

    RequestDelete(PendingDelete),
    ConfirmDelete,
    CancelDelete,

    SelectImage(String),
    SelectComment(String),
    CommentDraftChanged(String),
    AddComment,
    PinPlaced(f32, f32),
    CancelPin,
    ReplyDraftChanged(String),
    SendReply,
    ResolveComment(String),
    MarkAllRead,

    DraftNameChanged(String),
    DraftDescriptionChanged(String),
    ShareWithChanged(String),
    ShareMessageChanged(String),
    SaveGallery,
}

impl Haven {
    fn open() -> error::Result<Self> {
        Self::with_config(Config::resolve()?)
    }

    /// Open storage under `config` and run the startup passes
    fn with_config(config: Config) -> error::Result<Self> {
        config.ensure_dirs()?;

        let store = SqliteStore::open(&config.db_path)?;
        tracing::debug!("Store: {:?}", store.path());
        let library = ProjectLibrary::new(store, DocumentDir::new(config.documents_dir.clone()));

        let now = now_millis();
        let mut session = CommentSession::new(now);
        run_startup_passes(&config, &library, &mut session, now);

        let placer = PlacementController::new(PreviewRenderer::new(config.scene_dir.clone()));

        let mut haven = Haven {
            config,
            library,
            session,
            placer,
            renderer_ready: false,
            started: Instant::now(),
            screen: Screen::Projects,
            status: String::new(),
            projects: Vec::new(),
            gallery: Vec::new(),
            thumbnails: HashMap::new(),
            capture_target: CaptureTarget::Gallery,
            thread: None,
            selected_image: None,
            selected_comment: None,
            comment_draft: String::new(),
            reply_draft: String::new(),
            project_edit: None,
            pending_delete: None,
            draft_name: String::new(),
            draft_description: String::new(),
            share_with: String::new(),
            share_message: String::new(),
        };
        haven.refresh();
        haven.status = format!("Ready. {} projects.", haven.projects.len());
        tracing::info!("🏠 Haven initialized with {} projects", haven.projects.len());
        Ok(haven)
    }

    /// Kick off the renderer wait and the first thumbnail pass
    fn boot(self) -> (Self, Task<Message>) {
        let renderer = self.placer.renderer().clone();
        let policy = self.config.renderer_retry;
        let ready = Task::perform(
            async move {
                wait_until_ready(&renderer, &policy)
                    .await
                    .map_err(|e| e.to_string())
            },
            Message::RendererReady,
        );

        let thumbnails = self.load_thumbnails();
        (self, Task::batch([ready, thumbnails]))
    }

    /// Milliseconds on the monotonic placement clock
    fn clock(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Reload the project list, unread badges and the gallery
    fn refresh(&mut self) {
        match self.library.list_projects() {
            Ok(projects) => {
                self.projects = projects
                    .into_iter()
                    .map(|p| {
                        let unread = CommentThread::open(self.library.store(), &p, &self.session).unread_count();
                        (p, unread)
                    })
                    .collect();
            }
            Err(e) => self.report("Failed to load projects", e),
        }

        match self.library.gallery_images() {
            Ok(images) => self.gallery = images,
            Err(e) => self.report("Failed to load gallery", e),
        }
    }

    /// Generate missing thumbnails off the UI thread
    fn load_thumbnails(&self) -> Task<Message> {
        let mut images: Vec<String> = self.gallery.clone();
        for (project, _) in &self.projects {
            images.extend(project.images.iter().cloned());
        }
        images.retain(|img| !self.thumbnails.contains_key(img));
        if images.is_empty() {
            return Task::none();
        }

        let docs = self.library.docs().clone();
        let cache_dir = self.config.thumbnail_dir.clone();
        Task::perform(
            async move {
                tokio::task::spawn_blocking(move || {
                    images
                        .into_iter()
                        .filter_map(|img| {
                            let path = docs.to_path(&img)?;
                            generate_thumbnail(&path, &cache_dir).map(|thumb| (img, thumb))
                        })
                        .collect::<Vec<_>>()
                })
                .await
                .unwrap_or_default()
            },
            Message::ThumbnailsReady,
        )
    }

    fn report(&mut self, context: &str, err: error::HavenError) {
        tracing::error!("⚠️  {}: {}", context, err);
        self.status = format!("{}: {}", context, err);
    }

    fn current_project(&self) -> Option<&SavedProject> {
        let Screen::Project(id) = &self.screen else {
            return None;
        };
        self.projects.iter().map(|(p, _)| p).find(|p| &p.id == id)
    }

    fn open_project(&mut self, id: String) {
        let project = match self.library.get_project(&id) {
            Ok(project) => project,
            Err(e) => return self.report("Failed to open project", e),
        };

        self.thread = Some(CommentThread::open(self.library.store(), &project, &self.session));
        self.selected_image = project.images.first().cloned();
        self.selected_comment = None;
        self.comment_draft.clear();
        self.reply_draft.clear();
        self.project_edit = None;
        self.pending_delete = None;
        self.screen = Screen::Project(id);
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                let now = self.clock();
                let events = self.placer.poll(now);
                if !events.is_empty() {
                    tracing::debug!("🎬 Scene events: {:?}", events);
                }
            }
            Message::RendererReady(Ok(attempts)) => {
                tracing::info!("✅ Scene renderer ready after {} attempt(s)", attempts);
                self.renderer_ready = true;
                let generation = self.placer.scene_generation();
                self.placer.renderer_mut().remount(generation, None);
            }
            Message::RendererReady(Err(e)) => {
                tracing::error!("❌ Scene renderer unavailable: {}", e);
                self.status = "The scene could not be started.".to_string();
            }
            Message::ThumbnailsReady(thumbs) => {
                self.thumbnails.extend(thumbs);
            }

            Message::ShowProjects => {
                self.placer.cancel_pending();
                self.pending_delete = None;
                self.thread = None;
                self.screen = Screen::Projects;
                self.refresh();
                return self.load_thumbnails();
            }
            Message::OpenProject(id) => {
                self.refresh();
                self.open_project(id);
                return self.load_thumbnails();
            }
            Message::EditProject => {
                self.project_edit = self.current_project().map(ProjectEdit::from_project);
            }
            Message::EditNameChanged(name) => {
                if let Some(edit) = self.project_edit.as_mut() {
                    edit.name = name;
                }
            }
            Message::EditDescriptionChanged(description) => {
                if let Some(edit) = self.project_edit.as_mut() {
                    edit.description = description;
                }
            }
            Message::EditShareWithChanged(shared_with) => {
                if let Some(edit) = self.project_edit.as_mut() {
                    edit.shared_with = shared_with;
                }
            }
            Message::EditShareMessageChanged(message) => {
                if let Some(edit) = self.project_edit.as_mut() {
                    edit.share_message = message;
                }
            }
            Message::SaveProjectEdits => {
                let (Screen::Project(id), Some(edit)) = (&self.screen, self.project_edit.as_ref()) else {
                    return Task::none();
                };
                match self.library.update_project(id, edit.to_update()) {
                    Ok(_) => {
                        self.project_edit = None;
                        self.status = "Project updated.".to_string();
                    }
                    Err(e) => self.report("Failed to update project", e),
                }
                self.refresh();
            }
            Message::CancelProjectEdits => self.project_edit = None,
            Message::StartNewProject => {
                let cleared = self
                    .library
                    .clear_gallery()
                    .and_then(|()| self.library.clear_draft_info());
                if let Err(e) = cleared {
                    self.report("Failed to start a new project", e);
                }
                self.draft_name.clear();
                self.draft_description.clear();
                self.refresh();
                self.capture_target = CaptureTarget::Gallery;
                self.screen = Screen::Placer;
            }
            Message::OpenPlacer(target) => {
                self.capture_target = target;
                self.screen = Screen::Placer;
            }
            Message::OpenGallery => {
                match self.library.draft_info() {
                    Ok(draft) => {
                        self.draft_name = draft.name.unwrap_or_default();
                        self.draft_description = draft.description.unwrap_or_default();
                    }
                    Err(e) => self.report("Failed to load draft", e),
                }
                self.capture_target = CaptureTarget::Gallery;
                self.screen = Screen::Gallery;
                self.refresh();
                return self.load_thumbnails();
            }
            Message::ImportPhoto => {
                let Some(source) = FileDialog::new()
                    .set_title("Select a room photo")
                    .add_filter("JPEG images", &["jpg", "jpeg"])
                    .pick_file()
                else {
                    return Task::none();
                };

                let target = match &self.screen {
                    Screen::Project(id) => CaptureTarget::Project(id.clone()),
                    _ => CaptureTarget::Gallery,
                };
                let now = now_millis();
                let saved = save_image_file(self.library.docs(), &source, Some(&room_scan_filename(now)), now)
                    .and_then(|filename| {
                        self.library.record_capture(&target, &filename)?;
                        Ok(filename)
                    });
                match saved {
                    Ok(filename) => self.status = format!("📸 Imported {}", filename),
                    Err(e) => self.report("Failed to import photo", e),
                }
                self.refresh();
                return self.load_thumbnails();
            }

            Message::SelectFurniture(kind) => {
                self.placer.select_furniture(kind, None);
                self.status = format!("Tap the floor to place the {}.", kind);
            }
            Message::ClearSelection => self.placer.clear_selection(),
            Message::SurfaceTapped(x, y) => {
                let now = self.clock();
                match self.placer.handle_surface_tap(surface_point(x, y), now) {
                    TapOutcome::Ignored => {}
                    TapOutcome::OnePieceOnly => {
                        self.status = "Only one piece of furniture at a time. Remove it to place another."
                            .to_string();
                    }
                    TapOutcome::Placed(furniture) => {
                        self.status = format!("Placed the {}.", furniture.kind);
                    }
                }
            }
            Message::MoveFurniture(direction) => {
                let now = self.clock();
                self.placer.move_furniture(direction, now);
            }
            Message::RemoveFurniture => {
                if let Some(removed) = self.placer.remove_furniture() {
                    self.status = format!("Removed the {}.", removed.kind);
                }
            }
            Message::CaptureScene => {
                let captured = self
                    .placer
                    .capture_to_documents(self.library.docs(), now_millis())
                    .and_then(|filename| {
                        self.library.record_capture(&self.capture_target, &filename)?;
                        Ok(filename)
                    });
                match captured {
                    Ok(filename) => self.status = format!("📸 Saved {}", filename),
                    Err(e) => self.report("Failed to capture scene", e),
                }
                self.refresh();
                return self.load_thumbnails();
            }

            Message::RequestDelete(target) => self.pending_delete = Some(target),
            Message::CancelDelete => self.pending_delete = None,
            Message::ConfirmDelete => {
                if let Some(target) = self.pending_delete.take() {
                    self.delete(target);
                }
            }

            Message::SelectImage(image) => {
                self.selected_image = Some(image);
                self.selected_comment = None;
                if let Some(thread) = self.thread.as_mut() {
                    thread.cancel_pending();
                }
            }
            Message::SelectComment(comment_id) => {
                if let Some(thread) = self.thread.as_mut() {
                    if let Err(e) = thread.mark_read(self.library.store(), &mut self.session, &comment_id) {
                        tracing::warn!("Could not mark {} read: {}", comment_id, e);
                    }
                }
                self.selected_comment = Some(comment_id);
                self.reply_draft.clear();
                self.refresh();
            }
            Message::CommentDraftChanged(draft) => self.comment_draft = draft,
            Message::AddComment => {
                let (Some(thread), Some(image)) = (self.thread.as_mut(), self.selected_image.as_ref()) else {
                    return Task::none();
                };
                match thread.add_comment(self.library.store(), image, &self.comment_draft, now_millis()) {
                    Ok(_) => {
                        self.comment_draft.clear();
                        self.status = "Tap the image to pin your comment.".to_string();
                    }
                    Err(e) => self.report("Failed to add comment", e),
                }
            }
            Message::PinPlaced(x, y) => {
                if let Some(thread) = self.thread.as_mut() {
                    match thread.place_pending(self.library.store(), f64::from(x), f64::from(y)) {
                        Ok(true) => self.status = "Comment pinned.".to_string(),
                        Ok(false) => {}
                        Err(e) => self.report("Failed to pin comment", e),
                    }
                }
            }
            Message::CancelPin => {
                if let Some(thread) = self.thread.as_mut() {
                    thread.cancel_pending();
                }
            }
            Message::ReplyDraftChanged(draft) => self.reply_draft = draft,
            Message::SendReply => {
                let (Some(thread), Some(id)) = (self.thread.as_mut(), self.selected_comment.as_ref()) else {
                    return Task::none();
                };
                match thread.reply(self.library.store(), id, &self.reply_draft, now_millis()) {
                    Ok(_) => self.reply_draft.clear(),
                    Err(e) => self.report("Failed to send reply", e),
                }
            }
            Message::ResolveComment(id) => {
                if let Some(thread) = self.thread.as_mut() {
                    if let Err(e) = thread.resolve(self.library.store(), &id) {
                        self.report("Failed to resolve comment", e);
                    }
                }
                self.selected_comment = None;
                self.refresh();
            }
            Message::MarkAllRead => {
                if let Some(thread) = self.thread.as_mut() {
                    if let Err(e) = thread.mark_all_read(self.library.store(), &mut self.session) {
                        self.report("Failed to mark comments read", e);
                    }
                }
                self.refresh();
            }

            Message::DraftNameChanged(name) => {
                self.draft_name = name;
                self.save_draft();
            }
            Message::DraftDescriptionChanged(description) => {
                self.draft_description = description;
                self.save_draft();
            }
            Message::ShareWithChanged(value) => self.share_with = value,
            Message::ShareMessageChanged(value) => self.share_message = value,
            Message::SaveGallery => {
                let shared_with = parse_recipients(&self.share_with);
                let share_message = Some(self.share_message.trim().to_string()).filter(|m| !m.is_empty());

                match self.library.finalize_gallery(shared_with, share_message, now_millis()) {
                    Ok(Some(project)) => {
                        self.status = format!("✅ Saved \"{}\"", project.name);
                        self.draft_name.clear();
                        self.draft_description.clear();
                        self.share_with.clear();
                        self.share_message.clear();
                        self.refresh();
                        self.open_project(project.id);
                    }
                    Ok(None) => self.status = "Add at least one photo before saving.".to_string(),
                    Err(e) => self.report("Failed to save project", e),
                }
            }
        }

        Task::none()
    }

    /// Carry out a confirmed delete
    fn delete(&mut self, target: PendingDelete) {
        match target {
            PendingDelete::Project(id) => {
                match self.library.delete_project(&id) {
                    Ok(()) => self.status = "Project deleted.".to_string(),
                    Err(e) => self.report("Failed to delete project", e),
                }
                self.thread = None;
                self.screen = Screen::Projects;
            }
            PendingDelete::Image(image) => {
                let Screen::Project(id) = self.screen.clone() else {
                    return;
                };
                match self.library.delete_project_image(&id, &image) {
                    Ok(project) => {
                        self.selected_image = project.images.first().cloned();
                        self.status = "Image deleted.".to_string();
                    }
                    Err(e) => self.report("Failed to delete image", e),
                }
            }
            PendingDelete::GalleryImage(image) => {
                if let Err(e) = self.library.delete_gallery_image(&image) {
                    self.report("Failed to remove image", e);
                }
            }
            PendingDelete::Comment(id) => {
                if let Some(thread) = self.thread.as_mut() {
                    if let Err(e) = thread.delete_comment(self.library.store(), &id) {
                        self.report("Failed to delete comment", e);
                    }
                }
                self.selected_comment = None;
            }
            PendingDelete::Reply(id) => {
                if let Some(thread) = self.thread.as_mut() {
                    if let Err(e) = thread.delete_reply(self.library.store(), &id) {
                        self.report("Failed to delete reply", e);
                    }
                }
            }
        }
        self.refresh();
    }

    fn save_draft(&mut self) {
        if let Err(e) = self.library.set_draft_info(&self.draft_name, &self.draft_description) {
            tracing::warn!("Could not save draft info: {}", e);
        }
    }

    /// Advance the placement timeline only while a remount is in flight
    fn subscription(&self) -> Subscription<Message> {
        if self.placer.is_transitioning() {
            iced::time::every(Duration::from_millis(TICK_MS)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let body = match &self.screen {
            Screen::Projects => self.view_projects(),
            Screen::Project(_) => self.view_project(),
            Screen::Placer => self.view_placer(),
            Screen::Gallery => self.view_gallery(),
        };

        let mut content = Column::new().spacing(16).padding(24);
        if let Some(target) = &self.pending_delete {
            content = content.push(
                row![
                    text(target.prompt()),
                    horizontal_space(),
                    button("Delete").on_press(Message::ConfirmDelete),
                    button("Cancel").on_press(Message::CancelDelete),
                ]
                .spacing(10)
                .align_y(Alignment::Center),
            );
        }
        let content = content.push(body).push(text(&self.status).size(14));

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn view_projects(&self) -> Element<Message> {
        let now = now_millis();
        let header = row![
            text("Projects").size(32),
            horizontal_space(),
            button("New project").on_press(Message::StartNewProject),
            button(text(format!("Continue draft ({})", self.gallery.len()))).on_press(Message::OpenGallery),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let list = self.projects.iter().fold(Column::new().spacing(10), |list, (project, unread)| {
            let mut line = Row::new().spacing(12).align_y(Alignment::Center);
            if let Some(thumb) = project.images.first().and_then(|img| self.thumbnails.get(img)) {
                line = line.push(image(image::Handle::from_path(thumb)).width(64.0).height(64.0));
            }
            line = line.push(
                column![
                    text(&project.name).size(18),
                    text(format!(
                        "{} · {} photos",
                        format_project_date(project.created_at, now),
                        project.images.len()
                    ))
                    .size(12),
                ]
                .spacing(4),
            );
            if *unread > 0 {
                line = line.push(text(format!("🔴 {}", unread)));
            }
            line = line
                .push(horizontal_space())
                .push(button("Open").on_press(Message::OpenProject(project.id.clone())))
                .push(button("Delete").on_press(Message::RequestDelete(PendingDelete::Project(project.id.clone()))));
            list.push(line)
        });

        column![header, scrollable(list)].spacing(20).into()
    }

    fn view_project(&self) -> Element<Message> {
        let (Some(project), Some(thread)) = (self.current_project(), self.thread.as_ref()) else {
            return text("Project not found").into();
        };
        let docs = self.library.docs();
        let now = now_millis();

        let header = row![
            button("← Projects").on_press(Message::ShowProjects),
            text(&project.name).size(28),
            text(format!("{} comments", thread.visible().len())).size(12),
            horizontal_space(),
            button("Edit").on_press(Message::EditProject),
            button("Place furniture").on_press(Message::OpenPlacer(CaptureTarget::Project(project.id.clone()))),
            button("Import photo").on_press(Message::ImportPhoto),
            button("Mark all read").on_press(Message::MarkAllRead),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let details: Element<Message> = match &self.project_edit {
            Some(edit) => column![
                row![
                    text_input("Project name", &edit.name).on_input(Message::EditNameChanged),
                    text_input("Description", &edit.description).on_input(Message::EditDescriptionChanged),
                ]
                .spacing(10),
                row![
                    text_input("Share with (comma separated)", &edit.shared_with)
                        .on_input(Message::EditShareWithChanged),
                    text_input("Message", &edit.share_message).on_input(Message::EditShareMessageChanged),
                    button("Save").on_press(Message::SaveProjectEdits),
                    button("Cancel").on_press(Message::CancelProjectEdits),
                ]
                .spacing(10),
            ]
            .spacing(8)
            .into(),
            None => {
                let recipients = match project.shared_with.as_deref() {
                    Some(recipients) if !recipients.is_empty() => format!("Shared with {}", recipients.join(", ")),
                    _ => "Not shared yet".to_string(),
                };
                column![text(&project.description).size(14), text(recipients).size(12)]
                    .spacing(4)
                    .into()
            }
        };

        let strip = project.images.iter().fold(Row::new().spacing(8), |strip, img| {
            let unread = thread.image_unread_count(docs, img);
            let label: Element<Message> = match self.thumbnails.get(img) {
                Some(thumb) => image(image::Handle::from_path(thumb)).width(72.0).height(72.0).into(),
                None => text(media::uri::extract_filename(img).to_string()).size(10).into(),
            };
            let badge = if unread > 0 { format!("🔴 {}", unread) } else { String::new() };
            strip.push(
                column![
                    button(label).on_press(Message::SelectImage(img.clone())),
                    text(badge).size(10),
                ]
                .spacing(2),
            )
        });

        let viewer: Element<Message> = match self.selected_image.as_ref() {
            Some(selected) => {
                let pins = thread
                    .image_comments(docs, selected)
                    .into_iter()
                    .filter_map(|c| {
                        let position = c.position?;
                        Some((c, position))
                    })
                    .enumerate()
                    .map(|(i, (c, position))| Pin {
                        comment_id: c.id.clone(),
                        x: position.x as f32,
                        y: position.y as f32,
                        label: (i + 1).to_string(),
                        unread: c.unread,
                        selected: self.selected_comment.as_deref() == Some(c.id.as_str()),
                    })
                    .collect();

                let placing = thread.pending_placement().is_some();
                let overlay = TapOverlay {
                    pins,
                    on_tap: placing.then_some(Message::PinPlaced as fn(f32, f32) -> Message),
                    on_pin: Some(Message::SelectComment),
                };

                let picture: Element<Message> = match docs.to_path(selected) {
                    Some(path) => image(image::Handle::from_path(path))
                        .width(VIEW_WIDTH)
                        .height(VIEW_HEIGHT)
                        .content_fit(ContentFit::Fill)
                        .into(),
                    None => text(selected.as_str()).into(),
                };

                let mut viewer = column![stack![
                    picture,
                    canvas(overlay).width(VIEW_WIDTH).height(VIEW_HEIGHT),
                ]]
                .spacing(8);

                if placing {
                    viewer = viewer.push(row![
                        text("Tap the image to pin your comment."),
                        button("Cancel").on_press(Message::CancelPin),
                    ].spacing(10));
                } else {
                    viewer = viewer.push(
                        row![
                            text_input("Comment on this photo…", &self.comment_draft)
                                .on_input(Message::CommentDraftChanged)
                                .on_submit(Message::AddComment),
                            button("Comment").on_press(Message::AddComment),
                            button("Delete photo").on_press(Message::RequestDelete(PendingDelete::Image(selected.clone()))),
                        ]
                        .spacing(10),
                    );
                }
                viewer.into()
            }
            None => text("No photos yet").into(),
        };

        let comments = conversation(project, thread.comments()).into_iter().fold(
            Column::new().spacing(12).width(320.0),
            |list, comment| {
                let selected = self.selected_comment.as_deref() == Some(comment.id.as_str());
                let marker = if comment.unread { "● " } else { "" };
                let mut entry = column![
                    button(text(format!("{}{}", marker, comment.author)).size(14))
                        .on_press(Message::SelectComment(comment.id.clone())),
                    text(comment.message.clone()).size(13),
                    text(format_comment_time(comment.timestamp, now)).size(11),
                ]
                .spacing(4);

                if let Some(reply) = &comment.reply {
                    let mut line = row![text(format!("↳ {}: {}", reply.author, reply.message)).size(12)].spacing(6);
                    if is_own(reply) {
                        line = line.push(
                            button(text("✕").size(11))
                                .on_press(Message::RequestDelete(PendingDelete::Reply(comment.id.clone()))),
                        );
                    }
                    entry = entry.push(line);
                }

                if selected && thread.get(&comment.id).is_some() {
                    entry = entry.push(
                        row![
                            text_input("Reply…", &self.reply_draft)
                                .on_input(Message::ReplyDraftChanged)
                                .on_submit(Message::SendReply),
                            button("Send").on_press(Message::SendReply),
                        ]
                        .spacing(6),
                    );
                    let mut actions =
                        row![button("Resolve").on_press(Message::ResolveComment(comment.id.clone()))].spacing(6);
                    if is_own(&comment) {
                        actions = actions.push(
                            button("Delete")
                                .on_press(Message::RequestDelete(PendingDelete::Comment(comment.id.clone()))),
                        );
                    }
                    entry = entry.push(actions);
                }
                list.push(entry)
            },
        );

        column![
            header,
            details,
            scrollable(strip).direction(scrollable::Direction::Horizontal(
                scrollable::Scrollbar::default()
            )),
            row![viewer, scrollable(comments)].spacing(20),
        ]
        .spacing(16)
        .into()
    }

    fn view_placer(&self) -> Element<Message> {
        let back = match &self.capture_target {
            CaptureTarget::Gallery => Message::OpenGallery,
            CaptureTarget::Project(id) => Message::OpenProject(id.clone()),
        };

        let header = row![
            button("← Back").on_press(back),
            text("Place furniture").size(28),
            horizontal_space(),
            button("📸 Capture").on_press_maybe(
                (self.renderer_ready && !self.placer.mask_visible()).then_some(Message::CaptureScene)
            ),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let picker = FurnitureKind::ALL.iter().fold(Row::new().spacing(8), |picker, kind| {
            let label = if self.placer.selection().is_some_and(|s| s.kind == *kind) {
                format!("[{}]", kind)
            } else {
                kind.to_string()
            };
            picker.push(button(text(label)).on_press(Message::SelectFurniture(*kind)))
        });
        let picker = if self.placer.selection().is_some() {
            picker.push(button("Cancel").on_press(Message::ClearSelection))
        } else {
            picker
        };

        let scene: Element<Message> = match (self.renderer_ready, self.placer.renderer().visible_frame()) {
            (true, Some(frame)) => {
                let overlay = TapOverlay {
                    pins: Vec::new(),
                    on_tap: self
                        .placer
                        .selection()
                        .map(|_| Message::SurfaceTapped as fn(f32, f32) -> Message),
                    on_pin: None,
                };
                stack![
                    image(image::Handle::from_path(frame))
                        .width(VIEW_WIDTH)
                        .height(VIEW_HEIGHT)
                        .content_fit(ContentFit::Fill),
                    canvas(overlay).width(VIEW_WIDTH).height(VIEW_HEIGHT),
                ]
                .into()
            }
            _ => text("Starting the scene…").into(),
        };

        let placed = match self.placer.placed() {
            Some(furniture) => format!("In the room: {}", furniture.kind),
            None => "Pick a piece, then tap the floor.".to_string(),
        };
        let mut content = column![header, picker, scene, text(placed).size(12)].spacing(16);

        if self.placer.editing().is_some() {
            let moves = [
                ("Up", MoveDirection::Up),
                ("Down", MoveDirection::Down),
                ("Left", MoveDirection::Left),
                ("Right", MoveDirection::Right),
                ("Closer", MoveDirection::Forward),
                ("Farther", MoveDirection::Backward),
            ]
            .into_iter()
            .fold(Row::new().spacing(8), |controls, (label, direction)| {
                controls.push(button(label).on_press(Message::MoveFurniture(direction)))
            })
            .push(button("Remove").on_press(Message::RemoveFurniture));
            content = content.push(moves);
        }

        content.into()
    }

    fn view_gallery(&self) -> Element<Message> {
        let header = row![
            button("← Projects").on_press(Message::ShowProjects),
            text("New project").size(28),
            horizontal_space(),
            button("Place furniture").on_press(Message::OpenPlacer(CaptureTarget::Gallery)),
            button("Import photo").on_press(Message::ImportPhoto),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let photos = self.gallery.iter().fold(Row::new().spacing(8), |photos, img| {
            let preview: Element<Message> = match self.thumbnails.get(img) {
                Some(thumb) => image(image::Handle::from_path(thumb)).width(96.0).height(96.0).into(),
                None => text(media::uri::extract_filename(img).to_string()).size(10).into(),
            };
            photos.push(
                column![
                    preview,
                    button(text("Remove").size(11))
                        .on_press(Message::RequestDelete(PendingDelete::GalleryImage(img.clone()))),
                ]
                .spacing(4)
                .align_x(Alignment::Center),
            )
        });

        column![
            header,
            scrollable(photos).direction(scrollable::Direction::Horizontal(
                scrollable::Scrollbar::default()
            )),
            text_input("Project name", &self.draft_name).on_input(Message::DraftNameChanged),
            text_input("Description", &self.draft_description).on_input(Message::DraftDescriptionChanged),
            text_input("Share with (comma separated)", &self.share_with).on_input(Message::ShareWithChanged),
            text_input("Message", &self.share_message).on_input(Message::ShareMessageChanged),
            button("Save project")
                .on_press(Message::SaveGallery)
                .padding(10),
        ]
        .spacing(12)
        .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Startup passes, in order; each failure is logged and the next pass still runs
fn run_startup_passes(
    config: &Config,
    library: &ProjectLibrary<SqliteStore>,
    session: &mut CommentSession,
    now: i64,
) {
    if let Err(e) = library.seed_demo_projects(&config.demo_asset_dir, now) {
        tracing::error!("⚠️  Error seeding demo projects: {}", e);
    }

    match library.migrate_project_images() {
        Ok(report) if report.changed() => tracing::info!(
            "🔧 Migrated image references: {} repaired, {} dropped",
            report.repaired,
            report.dropped
        ),
        Ok(_) => {}
        Err(e) => tracing::error!("⚠️  Error migrating image references: {}", e),
    }

    match library.cleanup_missing_images(config.prune_missing_images) {
        Ok(0) => {}
        Ok(removed) => tracing::info!("🧹 Pruned {} missing image references", removed),
        Err(e) => tracing::error!("⚠️  Error pruning missing images: {}", e),
    }

    if let Err(e) = clear_stored_comments_once(library.store()) {
        tracing::error!("⚠️  Error clearing stored comments: {}", e);
    }

    match library.list_projects() {
        Ok(projects) => {
            if let Err(e) = session.reset_demo_comments_once(library.store(), &projects) {
                tracing::error!("⚠️  Error resetting demo comments: {}", e);
            }
        }
        Err(e) => tracing::error!("⚠️  Error loading projects: {}", e),
    }
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("haven=info")),
        )
        .init();

    let haven = match Haven::open() {
        Ok(haven) => haven,
        Err(e) => {
            tracing::error!("❌ Failed to start Haven: {}", e);
            std::process::exit(1);
        }
    };

    iced::application("Haven", Haven::update, Haven::view)
        .subscription(Haven::subscription)
        .theme(Haven::theme)
        .centered()
        .run_with(move || haven.boot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::demo::DemoProject;

    fn haven(root: &std::path::Path) -> Haven {
        Haven::with_config(Config::for_root(root)).unwrap()
    }

    fn demo_id(haven: &Haven, demo: DemoProject) -> String {
        haven
            .projects
            .iter()
            .find(|(p, _)| p.demo == Some(demo))
            .map(|(p, _)| p.id.clone())
            .unwrap()
    }

    #[test]
    fn test_project_delete_waits_for_confirmation() {
        let tmp = tempfile::tempdir().unwrap();
        let mut haven = haven(tmp.path());
        let id = demo_id(&haven, DemoProject::SerasRoom);
        let count = haven.projects.len();

        let _ = haven.update(Message::RequestDelete(PendingDelete::Project(id.clone())));
        assert_eq!(haven.projects.len(), count);
        let _ = haven.update(Message::CancelDelete);
        assert!(haven.pending_delete.is_none());
        assert!(haven.library.get_project(&id).is_ok());

        let _ = haven.update(Message::RequestDelete(PendingDelete::Project(id.clone())));
        let _ = haven.update(Message::ConfirmDelete);
        assert!(haven.pending_delete.is_none());
        assert!(haven.library.get_project(&id).is_err());
        assert_eq!(haven.projects.len(), count - 1);
    }

    #[test]
    fn test_project_edit_changes_recipients_and_message() {
        let tmp = tempfile::tempdir().unwrap();
        let mut haven = haven(tmp.path());
        let id = demo_id(&haven, DemoProject::GregsHouse);

        let _ = haven.update(Message::OpenProject(id.clone()));
        let _ = haven.update(Message::EditProject);
        let _ = haven.update(Message::EditShareWithChanged("nancy@example.com, bess@example.com".to_string()));
        let _ = haven.update(Message::EditShareMessageChanged("  Which rug?  ".to_string()));
        let _ = haven.update(Message::SaveProjectEdits);

        assert!(haven.project_edit.is_none());
        let project = haven.library.get_project(&id).unwrap();
        assert_eq!(project.name, DemoProject::GregsHouse.name());
        assert_eq!(
            project.shared_with,
            Some(vec!["nancy@example.com".to_string(), "bess@example.com".to_string()])
        );
        assert_eq!(project.share_message.as_deref(), Some("Which rug?"));
    }
}
