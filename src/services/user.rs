//! User service
//!
//! Account business logic:
//! - signup (accounts start unaccepted)
//! - login / logout with session tokens
//! - session validation, expired sessions are dropped on sight
//! - profile editing
//! - moderator flag changes used by the admin CLI

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{ProfileInput, Session, User, USERNAME_MAX_LENGTH};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 14;

/// Minimum accepted password length
pub const PASSWORD_MIN_LENGTH: usize = 8;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9@.+_-]+$").expect("valid username regex"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    /// No such user
    #[error("User not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl UserServiceError {
    /// Message suitable for showing next to a form
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationError(msg)
            | Self::ValidationError(msg)
            | Self::UserExists(msg)
            | Self::NotFound(msg) => msg.clone(),
            Self::InternalError(_) => "Something went wrong, please try again.".to_string(),
        }
    }
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a new user service with custom session expiration
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// Register a new account.
    ///
    /// The account is created with `registration_accepted = false` and
    /// `is_moderator = false`, whatever the input says.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a bad username, email or password
    /// - `UserExists` if the username is taken
    pub async fn register(&self, input: SignupInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&input.password, &input.password_confirm)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(username_taken(&username));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(username, email, password_hash);

        // A concurrent signup can still win the race to the UNIQUE index.
        let created = match self.user_repo.create(&user).await {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => return Err(username_taken(&user.username)),
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        tracing::info!(user_id = created.id, username = %created.username, "User signed up");
        Ok(created)
    }

    /// Log in with username and password.
    ///
    /// Unaccepted accounts can log in; entitlement is checked per request.
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let invalid = || {
            UserServiceError::AuthenticationError(
                "Please enter a correct username and password.".to_string(),
            )
        };

        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            tracing::debug!(user_id = user.id, "Rejected login: wrong password");
            return Err(invalid());
        }

        let session = self.create_session(user.id).await?;
        tracing::info!(user_id = user.id, username = %user.username, "User logged in");

        Ok((session, user))
    }

    /// Invalidate a session token
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Returns `None` for unknown or expired tokens. Expired sessions are
    /// deleted here.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?;
        Ok(user)
    }

    /// All accounts, ordered by id
    pub async fn list_users(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.list().await.context("Failed to list users")?)
    }

    /// Update username and email of `user_id`.
    ///
    /// Same rules as signup; the uniqueness check ignores the user's own row.
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: ProfileInput,
    ) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        validate_username(&username)?;
        validate_email(&email)?;

        let mut user = self
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(format!("User {} not found", user_id)))?;

        if let Some(existing) = self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
        {
            if existing.id != user_id {
                return Err(username_taken(&username));
            }
        }

        user.username = username;
        user.email = email;

        match self.user_repo.update(&user).await {
            Ok(updated) => Ok(updated),
            Err(e) if is_unique_violation(&e) => Err(username_taken(&user.username)),
            Err(e) => Err(e.context("Failed to update user").into()),
        }
    }

    /// Accept or revoke a registration by username.
    ///
    /// Revoking also ends every live session of the account.
    pub async fn set_registration_accepted(
        &self,
        username: &str,
        accepted: bool,
    ) -> Result<User, UserServiceError> {
        let mut user = self.require_by_username(username).await?;
        user.registration_accepted = accepted;

        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update registration flag")?;

        if !accepted {
            self.session_repo
                .delete_by_user(updated.id)
                .await
                .context("Failed to end sessions of revoked user")?;
        }

        tracing::info!(user_id = updated.id, accepted, "Registration flag changed");
        Ok(updated)
    }

    /// Grant or remove moderator status by username
    pub async fn set_moderator(
        &self,
        username: &str,
        moderator: bool,
    ) -> Result<User, UserServiceError> {
        let mut user = self.require_by_username(username).await?;
        user.is_moderator = moderator;

        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update moderator flag")?;

        tracing::info!(user_id = updated.id, moderator, "Moderator flag changed");
        Ok(updated)
    }

    /// Delete all expired sessions, returning the number removed
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn require_by_username(&self, username: &str) -> Result<User, UserServiceError> {
        self.get_by_username(username)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(format!("No user named '{}'", username)))
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::start(user_id, self.session_expiration_days);

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }
}

fn username_taken(username: &str) -> UserServiceError {
    UserServiceError::UserExists(format!(
        "A user with username '{}' already exists.",
        username
    ))
}

/// Whether a repository error was caused by a UNIQUE constraint
fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    if username.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Username cannot be empty.".to_string(),
        ));
    }
    if username.chars().count() > USERNAME_MAX_LENGTH {
        return Err(UserServiceError::ValidationError(format!(
            "Username must be at most {} characters.",
            USERNAME_MAX_LENGTH
        )));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(UserServiceError::ValidationError(
            "Username may contain only letters, numbers, and @/./+/-/_ characters.".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if !email.is_empty() && !email.contains('@') {
        return Err(UserServiceError::ValidationError(
            "Enter a valid email address.".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str, confirm: &str) -> Result<(), UserServiceError> {
    if password != confirm {
        return Err(UserServiceError::ValidationError(
            "The two password fields didn't match.".to_string(),
        ));
    }
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(UserServiceError::ValidationError(format!(
            "This password is too short. It must contain at least {} characters.",
            PASSWORD_MIN_LENGTH
        )));
    }
    Ok(())
}

/// Input for account signup
#[derive(Debug, Clone, Default)]
pub struct SignupInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl SignupInput {
    /// Signup input with matching password and confirmation
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            username: username.into(),
            email: email.into(),
            password_confirm: password.clone(),
            password,
        }
    }
}

/// Input for user login
#[derive(Debug, Clone, Default)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}
