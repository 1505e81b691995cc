/// The two built-in demo projects and their seed content
///
/// Demo projects showcase sharing and commenting without a backend: their
/// metadata is rewritten on every start and their comment threads are
/// regenerated from the tables below.

use serde::{Deserialize, Serialize};

use super::data::{Comment, Position};

const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Names longer than this are never treated as a demo project
const MAX_DEMO_NAME_LEN: usize = 20;

/// Stable identity of a demo project
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DemoProject {
    GregsHouse,
    SerasRoom,
}

/// Seed entry for one mock comment
struct MockSeed {
    id: &'static str,
    author: &'static str,
    message: &'static str,
    /// How long before the reference time the comment was "posted"
    age_ms: i64,
    /// Index into the project's images, when the comment is pinned to one
    image: Option<usize>,
    x: f64,
    y: f64,
}

const GREG_COMMENTS: &[MockSeed] = &[
    MockSeed {
        id: "greg-1",
        author: "Laura Palmer",
        message: "Looks great so far. Can we see some tables options?",
        age_ms: DAY_MS,
        image: None,
        x: 0.3,
        y: 0.4,
    },
    MockSeed {
        id: "greg-2",
        author: "Nancy Drew",
        message: "With the lamp there, you could put some artwork to fill the blank wallspace here.",
        age_ms: 2 * HOUR_MS,
        image: Some(0),
        x: 0.6,
        y: 0.3,
    },
    MockSeed {
        id: "greg-3",
        author: "Michael Jordan",
        message: "Great work! The room layout is very well thought out.",
        age_ms: HOUR_MS,
        image: None,
        x: 0.5,
        y: 0.6,
    },
    MockSeed {
        id: "greg-4",
        author: "Kevin Hart",
        message: "I'd reccomend maybe shifting the couch here so it's not in front of the window. What do you think?",
        age_ms: 30 * 60_000,
        image: Some(1),
        x: 0.7,
        y: 0.5,
    },
    MockSeed {
        id: "greg-5",
        author: "Nancy Drew",
        message: "This is a nice size, but maybe a more modern lamp would be better.",
        age_ms: 15 * 60_000,
        image: Some(0),
        x: 0.2,
        y: 0.7,
    },
    MockSeed {
        id: "greg-6",
        author: "Laura Palmer",
        message: "This lamp takes up too much space. Maybe a smaller one would be better.",
        age_ms: 10 * 60_000,
        image: Some(0),
        x: 0.4,
        y: 0.4,
    },
    MockSeed {
        id: "greg-7",
        author: "Kevin Hart",
        message: "I really like the color scheme with this this couch.",
        age_ms: 5 * 60_000,
        image: Some(1),
        x: 0.3,
        y: 0.45,
    },
];

const SERA_COMMENTS: &[MockSeed] = &[
    MockSeed {
        id: "sera-1",
        author: "Bob Johnson",
        message: "Well designed. Let's check out some couch options. Can you share some options?",
        age_ms: 2 * DAY_MS,
        image: None,
        x: 0.4,
        y: 0.5,
    },
    MockSeed {
        id: "sera-2",
        author: "Jane Smith",
        message: "I love this piece! It fits really well with your room.",
        age_ms: 3 * HOUR_MS,
        image: Some(0),
        x: 0.5,
        y: 0.4,
    },
    MockSeed {
        id: "sera-3",
        author: "John Doe",
        message: "I don't love the alignment. Maybe shift it more to the left?",
        age_ms: 90 * 60_000,
        image: Some(1),
        x: 0.3,
        y: 0.6,
    },
    MockSeed {
        id: "sera-4",
        author: "Alice Williams",
        message: "I like the theme but maybe a large art piece above your bed would fit better.",
        age_ms: 45 * 60_000,
        image: Some(0),
        x: 0.7,
        y: 0.5,
    },
    MockSeed {
        id: "sera-5",
        author: "Jane Smith",
        message: "I don't think this piece matches the theme of the one over your bed. Try a gold frame?",
        age_ms: 20 * 60_000,
        image: Some(1),
        x: 0.6,
        y: 0.3,
    },
];

impl DemoProject {
    pub const ALL: [DemoProject; 2] = [DemoProject::GregsHouse, DemoProject::SerasRoom];

    /// Identify a demo project from a user-visible name
    ///
    /// Apostrophe variants and unicode whitespace are normalized, then the
    /// name must contain both keywords and stay short. Only used for records
    /// that predate the stored `demo` flag.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = normalize_name(name);
        if normalized.chars().count() > MAX_DEMO_NAME_LEN {
            return None;
        }

        if normalized.contains("greg") && normalized.contains("house") {
            Some(DemoProject::GregsHouse)
        } else if normalized.contains("sera") && normalized.contains("room") {
            Some(DemoProject::SerasRoom)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DemoProject::GregsHouse => "Greg's House",
            DemoProject::SerasRoom => "Sera's Room",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DemoProject::GregsHouse => "Living room redesign with modern furniture and lighting",
            DemoProject::SerasRoom => "Bedroom makeover with minimalist aesthetic",
        }
    }

    pub fn recipients(&self) -> &'static [&'static str] {
        match self {
            DemoProject::GregsHouse => &["John Doe", "Jane Smith", "Bob Johnson"],
            DemoProject::SerasRoom => &["Alice Williams", "Michael Jordan"],
        }
    }

    pub fn share_message(&self) -> &'static str {
        match self {
            DemoProject::GregsHouse => {
                "Hey everyone! I'd love your feedback on my living room redesign. What do you think about the furniture choices and layout?"
            }
            DemoProject::SerasRoom => {
                "Looking for feedback on my bedroom redesign! Especially interested in thoughts about the color scheme and furniture placement."
            }
        }
    }

    /// Prefix of the bundled source images (`greg-1.jpg`, `sera-2.jpg`, ...)
    pub fn bundle_prefix(&self) -> &'static str {
        match self {
            DemoProject::GregsHouse => "greg",
            DemoProject::SerasRoom => "sera",
        }
    }

    /// How far before seeding time a freshly created demo project is dated
    pub fn created_age_ms(&self) -> i64 {
        match self {
            DemoProject::GregsHouse => DAY_MS,
            DemoProject::SerasRoom => 2 * DAY_MS,
        }
    }

    /// Document-directory filename for the n-th (1-based) bundled image
    pub fn image_filename(&self, n: usize) -> String {
        format!("demo_{}_{}.jpg", self.bundle_prefix(), n)
    }

    /// Regenerate the mock comment thread
    ///
    /// Output depends only on the identity, the image list and `reference_ms`,
    /// so two calls with the same inputs produce identical threads.
    pub fn mock_comments(&self, images: &[String], reference_ms: i64) -> Vec<Comment> {
        let seeds = match self {
            DemoProject::GregsHouse => GREG_COMMENTS,
            DemoProject::SerasRoom => SERA_COMMENTS,
        };

        seeds
            .iter()
            .map(|seed| {
                let mut comment = Comment::new(seed.id, seed.author, seed.message, reference_ms - seed.age_ms);
                comment.image_uri = seed.image.and_then(|i| images.get(i).cloned());
                comment.position = Some(Position { x: seed.x, y: seed.y });
                comment.unread = true;
                comment
            })
            .collect()
    }
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\u{0027}' | '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{201C}' | '\u{201D}')
}

fn is_name_space(c: char) -> bool {
    c.is_whitespace()
        || matches!(c, '\u{200B}' | '\u{FEFF}')
}

/// Lowercase, straight apostrophes, single spaces, trimmed
fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;

    for c in name.chars() {
        if is_name_space(c) {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;

        if is_apostrophe(c) {
            out.push('\'');
        } else {
            out.extend(c.to_lowercase());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_variants() {
        assert_eq!(DemoProject::from_name("Greg's House"), Some(DemoProject::GregsHouse));
        assert_eq!(DemoProject::from_name("  greg\u{2019}s\u{00A0}\u{00A0}HOUSE "), Some(DemoProject::GregsHouse));
        assert_eq!(DemoProject::from_name("Sera\u{2018}s Room"), Some(DemoProject::SerasRoom));
        assert_eq!(DemoProject::from_name("Kitchen"), None);
        // Too long to be one of the seeded names
        assert_eq!(DemoProject::from_name("Greg's house renovation phase two"), None);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("\u{FEFF} Greg\u{201B}s \t House\u{3000}"), "greg's house");
    }

    #[test]
    fn test_greg_mock_comments() {
        let images = vec!["demo_greg_1.jpg".to_string(), "demo_greg_2.jpg".to_string()];
        let comments = DemoProject::GregsHouse.mock_comments(&images, 10 * DAY_MS);

        assert_eq!(comments.len(), 7);
        assert!(comments.iter().all(|c| c.unread && !c.resolved));
        assert_eq!(comments[0].image_uri, None);
        assert_eq!(comments[1].image_uri.as_deref(), Some("demo_greg_1.jpg"));
        assert_eq!(comments[3].image_uri.as_deref(), Some("demo_greg_2.jpg"));
        assert_eq!(comments[0].timestamp, 9 * DAY_MS);
    }

    #[test]
    fn test_mock_comments_without_second_image() {
        let images = vec!["demo_sera_1.jpg".to_string()];
        let comments = DemoProject::SerasRoom.mock_comments(&images, 0);

        assert_eq!(comments.len(), 5);
        let sera3 = comments.iter().find(|c| c.id == "sera-3").unwrap();
        assert_eq!(sera3.image_uri, None);
    }

    #[test]
    fn test_mock_comments_are_deterministic() {
        let images = vec!["a.jpg".to_string()];
        assert_eq!(
            DemoProject::SerasRoom.mock_comments(&images, 42),
            DemoProject::SerasRoom.mock_comments(&images, 42)
        );
        assert_eq!(DemoProject::from_name("Patio"), None);
    }
}
