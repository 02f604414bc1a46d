// Server-rendered pages: item listing, posting and editing, accounts.
// Uses Askama templates, plain HTML forms and a session cookie.

mod account;
mod forms;
mod items;
mod templates;

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::engine::EngineError;
use crate::AppState;

pub use templates::*;

// Helper to render templates and handle errors
fn render_template<T: Template>(template: T) -> Response {
    render_with_status(StatusCode::OK, template)
}

fn render_with_status<T: Template>(status: StatusCode, template: T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Template error: {}", e)).into_response()
        }
    }
}

/// Map an engine rejection using the deployment's disclosure setting
fn engine_error(state: &AppState, err: EngineError) -> ApiError {
    ApiError::from_engine(err, state.config.auth.conceal_forbidden)
}

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(items::index))
        .route("/items", post(items::create))
        .route("/items/new", get(items::new_form))
        .route("/items/:id", get(items::show))
        .route("/items/:id/edit", get(items::edit_form).post(items::update))
        .route("/items/:id/mark-found", post(items::mark_found))
        .route("/register", get(account::register_page).post(account::register_submit))
        .route("/login", get(account::login_page).post(account::login_submit))
        .route("/logout", post(account::logout))
}
