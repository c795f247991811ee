//! Question model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum body length in characters
pub const QUESTION_BODY_MAX_LENGTH: usize = 200;

const DISPLAY_BODY_CHARS: usize = 40;

/// A short question, optionally linked to any number of the author's journals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier
    pub id: i64,
    /// Owning user, fixed at creation
    pub author_id: i64,
    /// Question text
    pub body: String,
    /// Creation timestamp, set once
    pub date: DateTime<Utc>,
    /// Updated on every save
    pub edited_date: DateTime<Utc>,
    /// Linked journal ids (many-to-many)
    #[serde(default)]
    pub journal_ids: Vec<i64>,
}

impl Question {
    /// Create an unsaved question for `author_id`.
    pub fn new(author_id: i64, body: String, journal_ids: Vec<i64>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            author_id,
            body,
            date: now,
            edited_date: now,
            journal_ids,
        }
    }

    /// Detail page URL
    pub fn absolute_url(&self) -> String {
        format!("/rodbt/questions/{}/", self.id)
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.body.chars().take(DISPLAY_BODY_CHARS).collect();
        f.write_str(&short)
    }
}

/// Input for creating a question
#[derive(Debug, Clone, Default)]
pub struct CreateQuestionInput {
    pub body: String,
    pub journal_ids: Vec<i64>,
}
