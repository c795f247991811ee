//! User model
//!
//! Accounts are created at signup with `registration_accepted = false`.
//! A moderator flips the flag before the owner can use journals and
//! questions; it never reverts on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum username length in characters
pub const USERNAME_MAX_LENGTH: usize = 150;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address, empty when not given
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Set by a moderator; gates access to owned-content pages
    pub registration_accepted: bool,
    /// Elevated account used for reviewing registrations
    pub is_moderator: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet accepted, user.
    ///
    /// The password must already be hashed, see
    /// `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            registration_accepted: false,
            is_moderator: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.id, self.username)
    }
}

/// Editable profile fields
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub username: String,
    pub email: String,
}
