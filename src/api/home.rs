//! Home page

use axum::{extract::State, response::Html};
use tera::Context as TeraContext;

use crate::api::middleware::{AppState, CurrentUser, PageError};

/// GET /
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Html<String>, PageError> {
    state.page("home.html", "Home", current.user(), TeraContext::new())
}
