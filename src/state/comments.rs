/// Comment threads: persistence, mock merging and per-thread mutations
///
/// Demo projects get a regenerated set of mock comments. Their content always
/// comes from code; their status (`unread`, `resolved`, `reply`) always comes
/// from storage. User comments have no mock counterpart and pass through.

use super::data::{unique_suffix, Comment, Position, SavedProject};
use super::session::CommentSession;
use super::store::{JsonStore, KvStore, COMMENTS_KEY_PREFIX};
use crate::error::{HavenError, Result};
use crate::media::uri::DocumentDir;

/// Id of the sentinel comment that carries a project's share message
pub const SHARE_MESSAGE_ID: &str = "original-share-message";

/// Author name for everything written on this device
pub const LOCAL_AUTHOR: &str = "You";

/// Storage key for a project's thread
pub fn comments_key(project_id: &str) -> String {
    format!("{}{}", COMMENTS_KEY_PREFIX, project_id)
}

/// Persisted comments for a project (empty when none were saved)
pub fn get_project_comments<S: KvStore + ?Sized>(store: &S, project_id: &str) -> Result<Vec<Comment>> {
    Ok(store.get_json(&comments_key(project_id))?.unwrap_or_default())
}

pub fn save_project_comments<S: KvStore + ?Sized>(
    store: &S,
    project_id: &str,
    comments: &[Comment],
) -> Result<()> {
    store.set_json(&comments_key(project_id), comments)
}

pub fn add_project_comment<S: KvStore + ?Sized>(store: &S, project_id: &str, comment: Comment) -> Result<()> {
    let mut comments = get_project_comments(store, project_id)?;
    comments.push(comment);
    save_project_comments(store, project_id, &comments)
}

/// Mock comments for a project, or nothing for user projects
pub fn mock_comments(project: &SavedProject, reference_ms: i64) -> Vec<Comment> {
    project
        .demo_identity()
        .map(|demo| demo.mock_comments(&project.images, reference_ms))
        .unwrap_or_default()
}

/// Merge regenerated mock comments with persisted ones
///
/// 1. A mock comment present in storage keeps its mock content and takes
///    `unread`, `resolved` and `reply` from storage.
/// 2. Persisted comments without a mock counterpart are appended unchanged.
/// 3. The result is ordered by timestamp with the share message sentinel first.
pub fn merge_comments(mock: Vec<Comment>, persisted: Vec<Comment>) -> Vec<Comment> {
    // Later duplicates of an id win, first position is kept
    let mut remaining: Vec<Comment> = Vec::with_capacity(persisted.len());
    for mut comment in persisted {
        // Replies are one level deep, whatever storage holds
        if let Some(reply) = comment.reply.take() {
            comment.set_reply(*reply);
        }
        match remaining.iter_mut().find(|c| c.id == comment.id) {
            Some(existing) => *existing = comment,
            None => remaining.push(comment),
        }
    }

    let mut merged = Vec::with_capacity(mock.len() + remaining.len());
    for mut mock_comment in mock {
        if let Some(index) = remaining.iter().position(|c| c.id == mock_comment.id) {
            let stored = remaining.remove(index);
            mock_comment.unread = stored.unread;
            mock_comment.resolved = stored.resolved;
            mock_comment.reply = stored.reply;
        }
        merged.push(mock_comment);
    }
    merged.extend(remaining);

    sort_thread(&mut merged);
    merged
}

/// Oldest first, share message sentinel pinned to the top
fn sort_thread(comments: &mut [Comment]) {
    comments.sort_by(|a, b| {
        let a_pinned = a.id == SHARE_MESSAGE_ID;
        let b_pinned = b.id == SHARE_MESSAGE_ID;
        b_pinned.cmp(&a_pinned).then(a.timestamp.cmp(&b.timestamp))
    });
}

/// Load a project's thread, merging mock content with stored status
///
/// On first load of a demo project the mock set is persisted as-is. Storage
/// failures degrade to the mock set.
pub fn load_project_comments<S: KvStore + ?Sized>(
    store: &S,
    project: &SavedProject,
    reference_ms: i64,
) -> Vec<Comment> {
    let mock = mock_comments(project, reference_ms);

    let persisted = match get_project_comments(store, &project.id) {
        Ok(persisted) => persisted,
        Err(e) => {
            tracing::error!("⚠️  Error loading comments for {}: {}", project.id, e);
            return mock;
        }
    };

    if persisted.is_empty() {
        if !mock.is_empty() {
            if let Err(e) = save_project_comments(store, &project.id, &mock) {
                tracing::error!("⚠️  Error saving mock comments for {}: {}", project.id, e);
            }
        }
        return mock;
    }

    merge_comments(mock, persisted)
}

/// The sentinel comment shown first in a project's conversation
pub fn share_message_comment(project: &SavedProject) -> Option<Comment> {
    let message = project.share_message.as_deref()?.trim();
    if message.is_empty() {
        return None;
    }
    Some(Comment::new(SHARE_MESSAGE_ID, LOCAL_AUTHOR, message, project.created_at))
}

/// Conversation listing: share message first, then unresolved comments
pub fn conversation(project: &SavedProject, comments: &[Comment]) -> Vec<Comment> {
    let mut listing: Vec<Comment> = Vec::with_capacity(comments.len() + 1);
    if !comments.iter().any(|c| c.id == SHARE_MESSAGE_ID) {
        listing.extend(share_message_comment(project));
    }
    listing.extend(comments.iter().filter(|c| !c.resolved).cloned());
    sort_thread(&mut listing);
    listing
}

/// The open comment thread of one project
///
/// Every mutation writes the whole thread back to storage before returning,
/// so badge counts computed from storage always agree with the thread.
#[derive(Debug, Clone)]
pub struct CommentThread {
    project_id: String,
    comments: Vec<Comment>,
    /// Comment waiting for the user to tap its pin position
    pending_placement: Option<String>,
}

impl CommentThread {
    /// Load a thread and re-apply anything read earlier in this session
    pub fn open<S: KvStore + ?Sized>(store: &S, project: &SavedProject, session: &CommentSession) -> Self {
        let mut comments = load_project_comments(store, project, session.reference_time());
        session.apply_reads(&mut comments);

        Self {
            project_id: project.id.clone(),
            comments,
            pending_placement: None,
        }
    }

    /// Everything in storage, resolved comments included
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Unresolved comments
    pub fn visible(&self) -> Vec<&Comment> {
        self.comments.iter().filter(|c| !c.resolved).collect()
    }

    pub fn unread_count(&self) -> usize {
        self.comments.iter().filter(|c| c.is_active_unread()).count()
    }

    /// Unresolved comments pinned to one image
    pub fn image_comments(&self, docs: &DocumentDir, image: &str) -> Vec<&Comment> {
        self.comments
            .iter()
            .filter(|c| !c.resolved)
            .filter(|c| c.image_uri.as_deref().is_some_and(|uri| docs.same_image(uri, image)))
            .collect()
    }

    pub fn image_unread_count(&self, docs: &DocumentDir, image: &str) -> usize {
        self.image_comments(docs, image).iter().filter(|c| c.unread).count()
    }

    /// Id of the comment waiting for a pin position
    pub fn pending_placement(&self) -> Option<&str> {
        self.pending_placement.as_deref()
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Comment> {
        self.comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| HavenError::NotFound(format!("comment {}", id)))
    }

    fn persist<S: KvStore + ?Sized>(&self, store: &S) -> Result<()> {
        save_project_comments(store, &self.project_id, &self.comments)
    }

    pub fn mark_read<S: KvStore + ?Sized>(
        &mut self,
        store: &S,
        session: &mut CommentSession,
        id: &str,
    ) -> Result<()> {
        self.find_mut(id)?.unread = false;
        session.record_read(id);
        self.persist(store)
    }

    pub fn mark_all_read<S: KvStore + ?Sized>(&mut self, store: &S, session: &mut CommentSession) -> Result<()> {
        for comment in &mut self.comments {
            comment.unread = false;
            session.record_read(&comment.id);
        }
        self.persist(store)
    }

    /// Soft delete: hidden from listings and counts, kept in storage
    pub fn resolve<S: KvStore + ?Sized>(&mut self, store: &S, id: &str) -> Result<()> {
        self.find_mut(id)?.resolved = true;
        self.persist(store)
    }

    /// Attach (or replace) the single reply of a comment
    pub fn reply<S: KvStore + ?Sized>(&mut self, store: &S, id: &str, text: &str, now_ms: i64) -> Result<Comment> {
        let text = non_blank(text)?;
        let reply = Comment::new(format!("reply-{}", now_ms), LOCAL_AUTHOR, text, now_ms);

        self.find_mut(id)?.set_reply(reply.clone());
        self.persist(store)?;
        Ok(reply)
    }

    /// Remove a reply; the parent's status flags are left as they are
    ///
    /// Only replies written on this device can be deleted.
    pub fn delete_reply<S: KvStore + ?Sized>(&mut self, store: &S, id: &str) -> Result<()> {
        let parent = self.find_mut(id)?;
        if let Some(reply) = &parent.reply {
            if !is_own(reply) {
                return Err(HavenError::InvalidInput(format!("reply on {} is not yours", id)));
            }
        }
        parent.reply = None;
        self.persist(store)
    }

    /// Remove one of the user's own comments entirely
    ///
    /// Mock comments come back on every load, so other authors' comments
    /// can only be resolved.
    pub fn delete_comment<S: KvStore + ?Sized>(&mut self, store: &S, id: &str) -> Result<()> {
        let index = self
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| HavenError::NotFound(format!("comment {}", id)))?;
        if !is_own(&self.comments[index]) {
            return Err(HavenError::InvalidInput(format!("comment {} is not yours", id)));
        }

        self.comments.remove(index);
        if self.pending_placement.as_deref() == Some(id) {
            self.pending_placement = None;
        }
        self.persist(store)
    }

    /// Add an unpinned comment on an image and wait for its pin position
    pub fn add_comment<S: KvStore + ?Sized>(
        &mut self,
        store: &S,
        image: &str,
        text: &str,
        now_ms: i64,
    ) -> Result<String> {
        let text = non_blank(text)?;
        let mut comment = Comment::new(
            format!("comment-{}-{}", now_ms, unique_suffix()),
            LOCAL_AUTHOR,
            text,
            now_ms,
        );
        comment.image_uri = Some(image.to_string());
        comment.unread = true;

        let id = comment.id.clone();
        add_project_comment(store, &self.project_id, comment.clone())?;
        self.comments.push(comment);
        self.pending_placement = Some(id.clone());
        Ok(id)
    }

    /// Pin the pending comment at a fractional image position
    ///
    /// Returns false when no comment is waiting for placement.
    pub fn place_pending<S: KvStore + ?Sized>(&mut self, store: &S, x: f64, y: f64) -> Result<bool> {
        let Some(id) = self.pending_placement.take() else {
            return Ok(false);
        };

        self.find_mut(&id)?.position = Some(Position::clamped(x, y));
        self.persist(store)?;
        Ok(true)
    }

    /// Leave placement mode without pinning
    pub fn cancel_pending(&mut self) {
        self.pending_placement = None;
    }
}

/// Written on this device
pub fn is_own(comment: &Comment) -> bool {
    comment.author == LOCAL_AUTHOR
}

fn non_blank(text: &str) -> Result<&str> {
    let text = text.trim();
    if text.is_empty() {
        Err(HavenError::InvalidInput("comment text is empty".to_string()))
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::demo::DemoProject;
    use crate::state::store::SqliteStore;

    const NOW: i64 = 1_700_000_000_000;

    fn project(name: &str, images: &[&str]) -> SavedProject {
        SavedProject {
            id: format!("project-{}", name.len()),
            name: name.to_string(),
            description: String::new(),
            images: images.iter().map(|s| s.to_string()).collect(),
            created_at: NOW - 1000,
            shared_with: None,
            share_message: None,
            demo: None,
        }
    }

    fn greg() -> SavedProject {
        project("Greg's House", &["demo_greg_1.jpg", "demo_greg_2.jpg"])
    }

    #[test]
    fn test_first_load_persists_mock_comments() {
        let store = SqliteStore::open_in_memory().unwrap();
        let p = greg();

        let comments = load_project_comments(&store, &p, NOW);
        assert_eq!(comments.len(), 7);
        assert!(comments.iter().all(|c| c.id != SHARE_MESSAGE_ID));
        assert_eq!(get_project_comments(&store, &p.id).unwrap(), comments);
    }

    #[test]
    fn test_user_project_has_no_mock_comments() {
        let store = SqliteStore::open_in_memory().unwrap();
        let p = project("Kitchen", &["image_1.jpg"]);
        assert!(load_project_comments(&store, &p, NOW).is_empty());
        assert_eq!(store.get(&comments_key(&p.id)).unwrap(), None);
    }

    #[test]
    fn test_merge_takes_status_from_storage_and_content_from_code() {
        let mock = DemoProject::GregsHouse.mock_comments(&greg().images, NOW);

        let mut stored = mock[0].clone();
        stored.message = "edited elsewhere".to_string();
        stored.unread = false;
        stored.resolved = true;
        stored.set_reply(Comment::new("reply-1", LOCAL_AUTHOR, "ok", NOW));

        let mut user = Comment::new("comment-1", LOCAL_AUTHOR, "mine", NOW - 10 * 86_400_000);
        user.unread = true;

        let merged = merge_comments(mock.clone(), vec![user.clone(), stored]);
        assert_eq!(merged.len(), 8);

        // User comment is oldest and passes through unchanged
        assert_eq!(merged[0], user);

        let greg1 = merged.iter().find(|c| c.id == "greg-1").unwrap();
        assert_eq!(greg1.message, mock[0].message);
        assert!(!greg1.unread);
        assert!(greg1.resolved);
        assert_eq!(greg1.reply.as_ref().unwrap().message, "ok");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mock = DemoProject::SerasRoom.mock_comments(&[], NOW);
        let mut stored = mock.clone();
        stored[2].unread = false;
        stored.push(Comment::new(SHARE_MESSAGE_ID, LOCAL_AUTHOR, "look", NOW + 50));
        stored.push(Comment::new("comment-x", LOCAL_AUTHOR, "hi", NOW - 5));

        let once = merge_comments(mock.clone(), stored);
        let twice = merge_comments(mock, once.clone());
        assert_eq!(once, twice);
        assert_eq!(once[0].id, SHARE_MESSAGE_ID);
    }

    #[test]
    fn test_share_message_and_conversation() {
        let mut p = project("Den", &[]);
        assert!(share_message_comment(&p).is_none());

        p.share_message = Some("What do you think?".to_string());
        let mut resolved = Comment::new("c1", "Nancy Drew", "old", NOW - 10);
        resolved.resolved = true;
        let open = Comment::new("c2", "Nancy Drew", "new", NOW - 5);

        let listing = conversation(&p, &[resolved, open]);
        let ids: Vec<&str> = listing.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![SHARE_MESSAGE_ID, "c2"]);
    }

    #[test]
    fn test_thread_read_and_resolve_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut session = CommentSession::new(NOW);
        let p = greg();
        let docs = DocumentDir::new("/docs");

        let mut thread = CommentThread::open(&store, &p, &session);
        assert_eq!(thread.unread_count(), 7);
        // greg-2, greg-5, greg-6 are pinned to the first image
        assert_eq!(thread.image_unread_count(&docs, "demo_greg_1.jpg"), 3);
        assert_eq!(
            thread.image_comments(&docs, "file:///old/Documents/demo_greg_2.jpg").len(),
            2
        );

        thread.mark_read(&store, &mut session, "greg-2").unwrap();
        thread.resolve(&store, "greg-5").unwrap();
        assert_eq!(thread.unread_count(), 5);
        assert_eq!(thread.image_unread_count(&docs, "demo_greg_1.jpg"), 1);
        assert_eq!(thread.visible().len(), 6);

        // Resolved comments stay in storage
        let stored = get_project_comments(&store, &p.id).unwrap();
        assert_eq!(stored.len(), 7);
        assert!(stored.iter().find(|c| c.id == "greg-5").unwrap().resolved);

        thread.mark_all_read(&store, &mut session).unwrap();
        assert_eq!(thread.unread_count(), 0);
        assert!(matches!(
            thread.mark_read(&store, &mut session, "nope"),
            Err(HavenError::NotFound(_))
        ));
    }

    #[test]
    fn test_read_state_survives_reopen() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut session = CommentSession::new(NOW);
        let p = greg();

        let mut thread = CommentThread::open(&store, &p, &session);
        thread.mark_read(&store, &mut session, "greg-3").unwrap();

        let reopened = CommentThread::open(&store, &p, &session);
        assert!(!reopened.get("greg-3").unwrap().unread);
        assert_eq!(reopened.unread_count(), 6);
    }

    #[test]
    fn test_reply_and_delete_reply() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut session = CommentSession::new(NOW);
        let p = greg();
        let mut thread = CommentThread::open(&store, &p, &session);

        thread.mark_read(&store, &mut session, "greg-4").unwrap();
        thread.resolve(&store, "greg-4").unwrap();
        thread.reply(&store, "greg-4", "  Good idea  ", NOW + 1).unwrap();
        assert_eq!(thread.get("greg-4").unwrap().reply.as_ref().unwrap().message, "Good idea");

        thread.delete_reply(&store, "greg-4").unwrap();
        let parent = thread.get("greg-4").unwrap();
        assert!(parent.reply.is_none());
        assert!(parent.resolved);
        assert!(!parent.unread);

        assert!(matches!(
            thread.reply(&store, "greg-4", "   ", NOW),
            Err(HavenError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_add_comment_then_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = CommentSession::new(NOW);
        let p = project("Den", &["furniture_scene_1.jpg"]);
        let mut thread = CommentThread::open(&store, &p, &session);

        assert!(!thread.place_pending(&store, 0.5, 0.5).unwrap());

        let id = thread
            .add_comment(&store, "furniture_scene_1.jpg", "Move the lamp", NOW)
            .unwrap();
        assert_eq!(thread.pending_placement(), Some(id.as_str()));
        assert!(thread.get(&id).unwrap().position.is_none());
        assert_eq!(thread.unread_count(), 1);

        assert!(thread.place_pending(&store, 1.4, 0.25).unwrap());
        assert_eq!(thread.pending_placement(), None);
        assert_eq!(
            thread.get(&id).unwrap().position,
            Some(Position { x: 1.0, y: 0.25 })
        );

        // User comments pass through the merge unchanged
        let stored = load_project_comments(&store, &p, NOW + 99);
        assert_eq!(stored, thread.comments());
    }

    #[test]
    fn test_delete_comment() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = CommentSession::new(NOW);
        let p = project("Den", &[]);
        let mut thread = CommentThread::open(&store, &p, &session);

        let id = thread.add_comment(&store, "image_1.jpg", "temp", NOW).unwrap();
        thread.delete_comment(&store, &id).unwrap();
        assert!(thread.comments().is_empty());
        assert_eq!(thread.pending_placement(), None);
        assert!(get_project_comments(&store, &p.id).unwrap().is_empty());
        assert!(thread.delete_comment(&store, &id).is_err());
    }

    #[test]
    fn test_mock_comments_cannot_be_deleted() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = CommentSession::new(NOW);
        let p = greg();

        let mut thread = CommentThread::open(&store, &p, &session);
        let own = thread.add_comment(&store, "demo_greg_1.jpg", "Love it", NOW).unwrap();
        assert!(matches!(
            thread.delete_comment(&store, "greg-3"),
            Err(HavenError::InvalidInput(_))
        ));
        thread.delete_comment(&store, &own).unwrap();

        let reopened = CommentThread::open(&store, &p, &session);
        assert_eq!(reopened.comments().len(), 7);
        assert!(reopened.get("greg-3").is_some());
        assert!(reopened.get(&own).is_none());
    }

    #[test]
    fn test_only_own_replies_can_be_deleted() {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = CommentSession::new(NOW);
        let p = project("Den", &[]);
        let mut thread = CommentThread::open(&store, &p, &session);

        let id = thread.add_comment(&store, "image_1.jpg", "Rug?", NOW).unwrap();
        let mut stored = get_project_comments(&store, &p.id).unwrap();
        stored[0].set_reply(Comment::new("reply-x", "Nancy Drew", "Yes", NOW + 1));
        save_project_comments(&store, &p.id, &stored).unwrap();

        let mut thread = CommentThread::open(&store, &p, &session);
        assert!(thread.delete_reply(&store, &id).is_err());
        assert!(thread.get(&id).unwrap().reply.is_some());

        thread.reply(&store, &id, "Blue one", NOW + 2).unwrap();
        thread.delete_reply(&store, &id).unwrap();
        assert!(thread.get(&id).unwrap().reply.is_none());
    }

    #[test]
    fn test_merge_flattens_nested_replies() {
        let mock = DemoProject::GregsHouse.mock_comments(&greg().images, NOW);

        let mut deep = Comment::new("reply-2", "Nancy Drew", "deeper", NOW);
        deep.reply = Some(Box::new(Comment::new("reply-3", LOCAL_AUTHOR, "deepest", NOW)));
        let mut middle = Comment::new("reply-1", LOCAL_AUTHOR, "reply", NOW);
        middle.reply = Some(Box::new(deep));

        let mut stored_mock = mock.iter().find(|c| c.id == "greg-2").unwrap().clone();
        stored_mock.reply = Some(Box::new(middle.clone()));
        let mut user = Comment::new("comment-1", LOCAL_AUTHOR, "mine", NOW);
        user.reply = Some(Box::new(middle));

        let merged = merge_comments(mock, vec![stored_mock, user]);
        for id in ["greg-2", "comment-1"] {
            let reply = merged.iter().find(|c| c.id == id).unwrap().reply.as_ref().unwrap();
            assert_eq!(reply.id, "reply-1");
            assert!(reply.reply.is_none());
        }
    }

    #[test]
    fn test_add_project_comment_appends() {
        let store = SqliteStore::open_in_memory().unwrap();
        add_project_comment(&store, "p1", Comment::new("a", "You", "one", 1)).unwrap();
        add_project_comment(&store, "p1", Comment::new("b", "You", "two", 2)).unwrap();
        assert_eq!(get_project_comments(&store, "p1").unwrap().len(), 2);
    }
}
