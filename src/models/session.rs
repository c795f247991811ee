//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login session backing the `session` cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session token (opaque, random)
    pub id: String,
    /// User this session authenticates
    pub user_id: i64,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a fresh session for `user_id` lasting `days` days.
    pub fn start(user_id: i64, days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at: now + Duration::days(days),
            created_at: now,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_sets_expiry_in_future() {
        let session = Session::start(7, 14);
        assert_eq!(session.user_id, 7);
        assert!(!session.is_expired());
        assert!(session.expires_at > session.created_at);
        assert_eq!(session.id.len(), 32);
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(Session::start(1, 1).id, Session::start(1, 1).id);
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let mut session = Session::start(1, 1);
        session.expires_at = Utc::now() - Duration::minutes(1);
        assert!(session.is_expired());
    }
}
