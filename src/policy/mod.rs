//! Access policy
//!
//! Decides whether an identity may perform an action on a target. Checks
//! run in a fixed order: authentication, then entitlement
//! (`registration_accepted`), then ownership. The first failing check wins.
//!
//! Handlers call [`gate`] with the request identity before touching the
//! store, and [`check_owner`] once the target has been loaded.

use crate::models::User;

/// Path of the login page
pub const LOGIN_URL: &str = "/accounts/login/";

/// Something a user can try to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewDashboard,
    ListJournals,
    CreateJournal,
    ViewJournal,
    ListQuestions,
    CreateQuestion,
    ViewQuestion,
    EditProfile,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::ViewDashboard,
        Action::ListJournals,
        Action::CreateJournal,
        Action::ViewJournal,
        Action::ListQuestions,
        Action::CreateQuestion,
        Action::ViewQuestion,
        Action::EditProfile,
    ];

    /// Whether the identity must have an accepted registration
    pub fn requires_acceptance(self) -> bool {
        !matches!(self, Action::EditProfile)
    }

    /// Whether the identity must own the target.
    ///
    /// Single journals are viewable by any accepted user; single questions
    /// are not.
    pub fn requires_ownership(self) -> bool {
        matches!(self, Action::ViewQuestion | Action::EditProfile)
    }
}

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No identity; the caller should be sent to the login page
    Unauthenticated,
    /// Identity present but not entitled; terminal
    Forbidden,
}

/// Outcome of a full policy evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectToLogin { next: String },
    Forbidden,
}

/// Authentication and entitlement checks.
///
/// Returns the authenticated user on success.
pub fn gate(identity: Option<&User>, action: Action) -> Result<&User, Denial> {
    let Some(user) = identity else {
        tracing::debug!(?action, "Denied: not authenticated");
        return Err(Denial::Unauthenticated);
    };

    if action.requires_acceptance() && !user.registration_accepted {
        tracing::debug!(?action, user_id = user.id, "Denied: registration not accepted");
        return Err(Denial::Forbidden);
    }

    Ok(user)
}

/// Ownership check against the target's owner id.
///
/// For actions without an ownership requirement this always passes.
pub fn check_owner(user: &User, action: Action, owner_id: i64) -> Result<(), Denial> {
    if action.requires_ownership() && user.id != owner_id {
        tracing::debug!(?action, user_id = user.id, owner_id, "Denied: not the owner");
        return Err(Denial::Forbidden);
    }
    Ok(())
}

/// Evaluate every check for one request.
///
/// `owner_id` is the target's owner when the action addresses a single
/// record, and `path` is the original request path used for the login
/// redirect.
pub fn authorize(
    identity: Option<&User>,
    action: Action,
    owner_id: Option<i64>,
    path: &str,
) -> Decision {
    let result = gate(identity, action).and_then(|user| match owner_id {
        Some(owner_id) => check_owner(user, action, owner_id),
        None => Ok(()),
    });

    match result {
        Ok(()) => Decision::Allow,
        Err(Denial::Unauthenticated) => Decision::RedirectToLogin {
            next: path.to_string(),
        },
        Err(Denial::Forbidden) => Decision::Forbidden,
    }
}

/// Login URL carrying `next` for the original path
pub fn login_redirect_url(next: &str) -> String {
    format!(
        "{}?next={}",
        LOGIN_URL,
        urlencoding::encode(next).replace("%2F", "/")
    )
}

/// Whether `next` is a local path that is safe to redirect to after login.
///
/// Control characters are refused outright: browsers drop tab, CR and LF
/// from URLs, so `/\t/host` would otherwise be followed as `//host`.
pub fn is_safe_next(next: &str) -> bool {
    if next.chars().any(char::is_control) {
        return false;
    }
    next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
}
