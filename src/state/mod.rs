/// State management module
///
/// This module handles all application state, including:
/// - The key-value store and its persisted keys (store.rs)
/// - Shared data structures (data.rs)
/// - Demo project fixtures (demo.rs)
/// - Projects and the in-progress gallery (projects.rs)
/// - Comment threads and their per-run session (comments.rs, session.rs)
/// - Furniture placement and scene remounts (placement.rs)

pub mod comments;
pub mod data;
pub mod demo;
pub mod placement;
pub mod projects;
pub mod session;
pub mod store;
