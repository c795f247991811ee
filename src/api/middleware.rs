//! Request middleware and shared handler plumbing
//!
//! Contains:
//! - [`AppState`] shared by every handler
//! - session loading (cookie or Bearer token)
//! - the [`CurrentUser`] extractor that applies the access policy
//! - [`PageError`] and the middleware that renders error pages

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::convert::Infallible;
use std::sync::Arc;
use tera::Context as TeraContext;

use crate::config::Config;
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::policy::{self, Action, Denial};
use crate::services::{EntryService, EntryServiceError, UserService, UserServiceError};
use crate::theme::PageRenderer;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

// ============================================================================
// Application state
// ============================================================================

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub entry_service: Arc<EntryService>,
    pub renderer: Arc<PageRenderer>,
}

impl AppState {
    /// Render a page, mapping template failures to a 500.
    pub fn page(
        &self,
        template: &str,
        page_title: &str,
        current_user: Option<&User>,
        context: TeraContext,
    ) -> Result<Html<String>, PageError> {
        self.renderer
            .render(template, page_title, current_user, context)
            .map(Html)
            .map_err(|e| PageError::Internal(format!("{:#}", e)))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Ways a page request can fail
#[derive(Debug)]
pub enum PageError {
    /// No identity; send the visitor to the login page
    RedirectToLogin { next: String },
    Forbidden,
    NotFound,
    Internal(String),
}

impl From<EntryServiceError> for PageError {
    fn from(e: EntryServiceError) -> Self {
        match e {
            EntryServiceError::NotFound(_) => PageError::NotFound,
            other => PageError::Internal(other.to_string()),
        }
    }
}

impl From<UserServiceError> for PageError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::NotFound(_) => PageError::NotFound,
            other => PageError::Internal(other.to_string()),
        }
    }
}

/// Marker left on error responses so [`render_error_pages`] can fill in the body
#[derive(Debug, Clone, Copy)]
struct ErrorPage {
    template: &'static str,
    title: &'static str,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, page) = match self {
            PageError::RedirectToLogin { next } => {
                return found(&policy::login_redirect_url(&next));
            }
            PageError::Forbidden => (
                StatusCode::FORBIDDEN,
                ErrorPage {
                    template: "403.html",
                    title: "Forbidden",
                },
            ),
            PageError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorPage {
                    template: "404.html",
                    title: "Not Found",
                },
            ),
            PageError::Internal(message) => {
                tracing::error!("Request failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorPage {
                        template: "500.html",
                        title: "Server Error",
                    },
                )
            }
        };

        let mut response = status.into_response();
        response.extensions_mut().insert(page);
        response
    }
}

/// Render the template for error responses produced by [`PageError`]
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = request.extensions().get::<SessionUser>().map(|s| s.0.clone());
    let response = next.run(request).await;

    let Some(page) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    let html = state.renderer.render_with_fallback(
        page.template,
        page.title,
        user.as_ref(),
        TeraContext::new(),
    );
    (response.status(), Html(html)).into_response()
}

// ============================================================================
// Sessions
// ============================================================================

/// User resolved from the session token, stored in request extensions
#[derive(Debug, Clone)]
pub struct SessionUser(pub User);

/// Extract session token from headers.
///
/// `Authorization: Bearer` wins over the session cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Resolve the session token, if any, to a [`SessionUser`].
///
/// Unknown or expired tokens leave the request anonymous.
pub async fn load_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(SessionUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// `Set-Cookie` value carrying a new session token
pub fn session_cookie(token: &str, expiration_days: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        expiration_days * 24 * 60 * 60
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> &'static str {
    "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
}

// ============================================================================
// Identity extractor
// ============================================================================

/// The request's identity plus the path used for login redirects.
///
/// Never rejects; anonymous requests carry `None`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    user: Option<User>,
    path: String,
}

impl CurrentUser {
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Authentication and entitlement checks for `action`
    pub fn require(&self, action: Action) -> Result<&User, PageError> {
        policy::gate(self.user.as_ref(), action).map_err(|denial| self.deny(denial))
    }

    /// Ownership check once the target has been loaded
    pub fn require_owner(&self, action: Action, owner_id: i64) -> Result<&User, PageError> {
        let user = self.require(action)?;
        policy::check_owner(user, action, owner_id).map_err(|denial| self.deny(denial))?;
        Ok(user)
    }

    fn deny(&self, denial: Denial) -> PageError {
        match denial {
            Denial::Unauthenticated => PageError::RedirectToLogin {
                next: self.path.clone(),
            },
            Denial::Forbidden => PageError::Forbidden,
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());

        Ok(Self {
            user: parts.extensions.get::<SessionUser>().map(|s| s.0.clone()),
            path,
        })
    }
}

// ============================================================================
// Responses
// ============================================================================

/// `302 Found` to `location`
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::error!("Refusing redirect to invalid location {:?}", location);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `302 Found` to `location` that also sets a cookie
pub fn found_with_cookie(location: &str, cookie: &str) -> Response {
    let mut response = found(location);
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(_) => tracing::error!("Refusing to send invalid cookie"),
    }
    response
}

/// Fallback for unknown routes
pub async fn not_found() -> PageError {
    PageError::NotFound
}
