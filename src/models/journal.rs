//! Journal model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum title length in characters
pub const JOURNAL_TITLE_MAX_LENGTH: usize = 200;

/// Characters of the title shown by `Display`
const DISPLAY_TITLE_CHARS: usize = 30;

/// A free-form journal entry owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    /// Unique identifier
    pub id: i64,
    /// Owning user, fixed at creation
    pub author_id: i64,
    /// Optional title
    pub title: Option<String>,
    /// Entry text
    pub body: String,
    /// Creation timestamp, set once
    pub date: DateTime<Utc>,
    /// Updated on every save
    pub edited_date: DateTime<Utc>,
}

impl Journal {
    /// Create an unsaved journal for `author_id`.
    pub fn new(author_id: i64, title: Option<String>, body: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            author_id,
            title,
            body,
            date: now,
            edited_date: now,
        }
    }

    /// Detail page URL
    pub fn absolute_url(&self) -> String {
        format!("/rodbt/journals/{}/", self.id)
    }
}

impl fmt::Display for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.title.as_deref().unwrap_or_default();
        let short: String = title.chars().take(DISPLAY_TITLE_CHARS).collect();
        f.write_str(&short)
    }
}

/// Input for creating a journal. There is no author field: the author is
/// always the creating user.
#[derive(Debug, Clone, Default)]
pub struct CreateJournalInput {
    pub title: Option<String>,
    pub body: String,
}
