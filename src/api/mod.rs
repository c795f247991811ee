//! HTTP layer - page handlers and routing
//!
//! Every route renders HTML through the shared [`PageRenderer`](crate::theme::PageRenderer).
//! Session loading and error page rendering run as middleware around all of
//! them; access checks happen in each handler through [`CurrentUser`].

pub mod accounts;
pub mod home;
pub mod middleware;
pub mod rodbt;

#[cfg(test)]
mod tests;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

pub use middleware::{AppState, CurrentUser, PageError};

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .merge(accounts::routes())
        .merge(rodbt::routes())
        .fallback(middleware::not_found)
        // Runs after load_session so error pages know who is logged in
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_session,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
