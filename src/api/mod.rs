mod admin;
pub mod auth;
pub mod error;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let uploads = ServeDir::new(&state.config.server.uploads_dir);

    Router::new()
        .route("/health", get(health_check))
        .route("/admin/clear-db-only", post(admin::clear_items))
        // HTML pages and form handlers
        .merge(crate::ui::create_router())
        .nest_service("/static/uploads", uploads)
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
