/// Per-run comment session state
///
/// Holds what used to be process-wide flags: whether the demo reset already
/// ran, which comments were read during this run, and the reference time
/// mock comments are dated against.

use std::collections::HashSet;

use super::comments::{get_project_comments, mock_comments, save_project_comments};
use super::data::{Comment, SavedProject};
use super::store::{JsonStore, KvStore, COMMENTS_CLEARED_KEY, COMMENTS_KEY_PREFIX};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CommentSession {
    /// Start of this run; mock comments are dated relative to it
    started_at: i64,
    demo_reset_done: bool,
    read_this_session: HashSet<String>,
}

impl CommentSession {
    pub fn new(started_at: i64) -> Self {
        Self {
            started_at,
            demo_reset_done: false,
            read_this_session: HashSet::new(),
        }
    }

    /// Anchor for mock comment timestamps; fixed for the whole run
    pub fn reference_time(&self) -> i64 {
        self.started_at
    }

    pub fn record_read(&mut self, comment_id: &str) {
        self.read_this_session.insert(comment_id.to_string());
    }

    pub fn was_read(&self, comment_id: &str) -> bool {
        self.read_this_session.contains(comment_id)
    }

    /// Mark comments read earlier in this run as read again
    pub fn apply_reads(&self, comments: &mut [Comment]) {
        for comment in comments.iter_mut() {
            if self.was_read(&comment.id) {
                comment.unread = false;
            }
        }
    }

    /// Simulate "new activity": reset demo threads to unread and unresolved
    ///
    /// Runs once per session. Threads that were never loaded are initialized
    /// from the mock set first. Returns the number of threads reset; the
    /// session counts as done even when a storage call fails.
    pub fn reset_demo_comments_once<S: KvStore + ?Sized>(
        &mut self,
        store: &S,
        projects: &[SavedProject],
    ) -> Result<usize> {
        if self.demo_reset_done {
            return Ok(0);
        }
        self.demo_reset_done = true;

        let mut reset = 0;
        for project in projects.iter().filter(|p| p.demo_identity().is_some()) {
            let mut comments = get_project_comments(store, &project.id)?;
            if comments.is_empty() {
                comments = mock_comments(project, self.started_at);
            }
            if comments.is_empty() {
                continue;
            }

            for comment in &mut comments {
                comment.unread = true;
                comment.resolved = false;
            }
            save_project_comments(store, &project.id, &comments)?;
            reset += 1;
        }

        tracing::info!("🔔 Reset {} demo comment threads to unread", reset);
        Ok(reset)
    }
}

/// One-time migration: drop every stored comment thread
///
/// Gated by a persisted marker, so it runs at most once per install.
/// Returns true when the clear ran.
pub fn clear_stored_comments_once<S: KvStore + ?Sized>(store: &S) -> Result<bool> {
    if store.get(COMMENTS_CLEARED_KEY)?.is_some() {
        return Ok(false);
    }

    let comment_keys: Vec<String> = store
        .keys()?
        .into_iter()
        .filter(|key| key.starts_with(COMMENTS_KEY_PREFIX))
        .collect();

    if !comment_keys.is_empty() {
        store.remove_many(&comment_keys)?;
        tracing::info!("🧹 Cleared {} stored comment threads", comment_keys.len());
    }

    store.set(COMMENTS_CLEARED_KEY, "true")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::comments::{comments_key, CommentThread};
    use crate::state::demo::DemoProject;
    use crate::state::store::SqliteStore;

    const NOW: i64 = 1_700_000_000_000;

    fn demo(demo: DemoProject, id: &str) -> SavedProject {
        SavedProject {
            id: id.to_string(),
            name: demo.name().to_string(),
            description: String::new(),
            images: vec![],
            created_at: NOW,
            shared_with: None,
            share_message: None,
            demo: Some(demo),
        }
    }

    #[test]
    fn test_reset_runs_once_per_session() {
        let store = SqliteStore::open_in_memory().unwrap();
        let greg = demo(DemoProject::GregsHouse, "p-greg");
        let mut user = demo(DemoProject::SerasRoom, "p-user");
        user.demo = None;
        user.name = "Kitchen".to_string();
        let projects = vec![greg.clone(), user.clone()];

        let mut session = CommentSession::new(NOW);
        let mut thread = CommentThread::open(&store, &greg, &session);
        thread.mark_all_read(&store, &mut session).unwrap();
        thread.resolve(&store, "greg-1").unwrap();

        // First reset in this session re-flags everything
        assert_eq!(session.reset_demo_comments_once(&store, &projects).unwrap(), 1);
        let stored = get_project_comments(&store, &greg.id).unwrap();
        assert!(stored.iter().all(|c| c.unread && !c.resolved));

        // Reading again sticks for the rest of the session
        let mut thread = CommentThread::open(&store, &greg, &session);
        thread.mark_read(&store, &mut session, "greg-2").unwrap();
        assert_eq!(session.reset_demo_comments_once(&store, &projects).unwrap(), 0);
        let reopened = CommentThread::open(&store, &greg, &session);
        assert!(!reopened.get("greg-2").unwrap().unread);

        // User projects are never touched
        assert_eq!(store.get(&comments_key(&user.id)).unwrap(), None);
    }

    #[test]
    fn test_new_session_resets_again() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sera = demo(DemoProject::SerasRoom, "p-sera");

        let mut first = CommentSession::new(NOW);
        first.reset_demo_comments_once(&store, std::slice::from_ref(&sera)).unwrap();
        let mut thread = CommentThread::open(&store, &sera, &first);
        thread.mark_all_read(&store, &mut first).unwrap();
        assert_eq!(thread.unread_count(), 0);

        let mut second = CommentSession::new(NOW + 60_000);
        second.reset_demo_comments_once(&store, std::slice::from_ref(&sera)).unwrap();
        let thread = CommentThread::open(&store, &sera, &second);
        assert_eq!(thread.unread_count(), 5);
    }

    #[test]
    fn test_clear_stored_comments_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("@haven_comments_a", "[]").unwrap();
        store.set("@haven_comments_b", "[]").unwrap();
        store.set("@haven_saved_projects", "[]").unwrap();

        assert!(clear_stored_comments_once(&store).unwrap());
        let keys = store.keys().unwrap();
        assert!(keys
            .iter()
            .filter(|k| k.as_str() != COMMENTS_CLEARED_KEY)
            .all(|k| !k.starts_with(COMMENTS_KEY_PREFIX)));
        assert!(keys.contains(&"@haven_saved_projects".to_string()));

        // Threads written after the migration survive later starts
        store.set("@haven_comments_c", "[]").unwrap();
        assert!(!clear_stored_comments_once(&store).unwrap());
        assert!(store.get("@haven_comments_c").unwrap().is_some());
    }
}
