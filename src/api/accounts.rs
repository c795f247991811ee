//! Account pages
//!
//! - `GET/POST /accounts/login/`
//! - `POST /accounts/logout/`
//! - `GET/POST /accounts/signup/`
//! - `GET /accounts/dashboard/`
//! - `GET/POST /accounts/{id}/edit/`

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::middleware::{
    clear_session_cookie, extract_session_token, found, found_with_cookie, session_cookie,
    AppState, CurrentUser, PageError,
};
use crate::api::rodbt::JournalSummary;
use crate::models::ProfileInput;
use crate::policy::{self, Action};
use crate::services::{LoginInput, SignupInput, UserServiceError};

/// Journals shown on the dashboard
const DASHBOARD_RECENT_JOURNALS: usize = 5;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts/login/", get(login_page).post(login))
        .route("/accounts/logout/", post(logout))
        .route("/accounts/signup/", get(signup_page).post(signup))
        .route("/accounts/dashboard/", get(dashboard))
        .route("/accounts/{id}/edit/", get(edit_profile_page).post(edit_profile))
}

// ============================================================================
// Login / logout
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    next: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    next: String,
}

fn login_context(username: &str, next: &str, form_error: Option<String>) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("form", &serde_json::json!({ "username": username }));
    context.insert("next", next);
    if let Some(message) = form_error {
        context.insert("form_error", &message);
    }
    context
}

/// GET /accounts/login/
async fn login_page(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<NextQuery>,
) -> Result<Response, PageError> {
    if current.user().is_some() {
        return Ok(found("/"));
    }

    let html = state.page(
        "registration/login.html",
        "Log In",
        None,
        login_context("", &query.next, None),
    )?;
    Ok(html.into_response())
}

/// POST /accounts/login/
///
/// Registration acceptance is not checked here; pending users may log in.
async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let input = LoginInput::new(form.username.trim(), form.password);

    match state.user_service.login(input).await {
        Ok((session, _user)) => {
            let target = if policy::is_safe_next(&form.next) {
                form.next.as_str()
            } else {
                "/"
            };
            let cookie = session_cookie(
                &session.id,
                state.config.session.expiration_days,
                state.config.session.cookie_secure,
            );
            Ok(found_with_cookie(target, &cookie))
        }
        Err(UserServiceError::InternalError(e)) => Err(PageError::Internal(format!("{:#}", e))),
        Err(e) => {
            let context = login_context(&form.username, &form.next, Some(e.user_message()));
            Ok(state
                .page("registration/login.html", "Log In", None, context)?
                .into_response())
        }
    }
}

/// POST /accounts/logout/
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, PageError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    let mut response = found("/");
    response.headers_mut().insert(
        header::SET_COOKIE,
        header::HeaderValue::from_static(clear_session_cookie()),
    );
    Ok(response)
}

// ============================================================================
// Signup
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password1: String,
    #[serde(default)]
    password2: String,
}

fn signup_context(username: &str, email: &str, form_error: Option<String>) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert(
        "form",
        &serde_json::json!({ "username": username, "email": email }),
    );
    if let Some(message) = form_error {
        context.insert("form_error", &message);
    }
    context
}

/// GET /accounts/signup/
async fn signup_page(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, PageError> {
    let html = state.page(
        "registration/signup.html",
        "Sign Up",
        current.user(),
        signup_context("", "", None),
    )?;
    Ok(html.into_response())
}

/// POST /accounts/signup/
async fn signup(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<SignupForm>,
) -> Result<Response, PageError> {
    let input = SignupInput {
        username: form.username.clone(),
        email: form.email.clone(),
        password: form.password1,
        password_confirm: form.password2,
    };

    match state.user_service.register(input).await {
        Ok(_) => Ok(found(policy::LOGIN_URL)),
        Err(UserServiceError::InternalError(e)) => Err(PageError::Internal(format!("{:#}", e))),
        Err(e) => {
            let context = signup_context(&form.username, &form.email, Some(e.user_message()));
            Ok(state
                .page("registration/signup.html", "Sign Up", current.user(), context)?
                .into_response())
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

/// GET /accounts/dashboard/
async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, PageError> {
    let user = current.require(Action::ViewDashboard)?;

    let journals = state.entry_service.list_journals(user.id).await?;
    let questions = state.entry_service.list_questions(user.id).await?;
    let recent: Vec<JournalSummary> = journals
        .iter()
        .take(DASHBOARD_RECENT_JOURNALS)
        .map(JournalSummary::from)
        .collect();

    let mut context = TeraContext::new();
    context.insert("journal_count", &journals.len());
    context.insert("question_count", &questions.len());
    context.insert("recent_journals", &recent);

    Ok(state
        .page("accounts/dashboard.html", "Dashboard", Some(user), context)?
        .into_response())
}

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
}

fn profile_context(
    target_id: i64,
    username: &str,
    email: &str,
    form_error: Option<String>,
) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("target_id", &target_id);
    context.insert(
        "form",
        &serde_json::json!({ "username": username, "email": email }),
    );
    if let Some(message) = form_error {
        context.insert("form_error", &message);
    }
    context
}

/// GET /accounts/{id}/edit/
async fn edit_profile_page(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, PageError> {
    let user = current.require_owner(Action::EditProfile, id)?;

    let context = profile_context(id, &user.username, &user.email, None);
    Ok(state
        .page("registration/update.html", "Edit Profile", Some(user), context)?
        .into_response())
}

/// POST /accounts/{id}/edit/
async fn edit_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Form(form): Form<ProfileForm>,
) -> Result<Response, PageError> {
    let user = current.require_owner(Action::EditProfile, id)?;

    let input = ProfileInput {
        username: form.username.clone(),
        email: form.email.clone(),
    };

    match state.user_service.update_profile(id, input).await {
        Ok(updated) => {
            tracing::info!(user_id = updated.id, "Profile updated");
            Ok(found("/"))
        }
        Err(UserServiceError::ValidationError(message))
        | Err(UserServiceError::UserExists(message)) => {
            let context = profile_context(id, &form.username, &form.email, Some(message));
            Ok(state
                .page("registration/update.html", "Edit Profile", Some(user), context)?
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}
