/// Image file handling
///
/// This module handles:
/// - Normalizing stored image references against the document directory
/// - Copying captures and bundled demo assets into persistent storage
/// - Rendering scene previews and caching thumbnails

pub mod files;
pub mod snapshot;
pub mod uri;
