pub mod error;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use crate::adapters::http::state::HttpState;

pub fn router(state: HttpState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/detect", post(routes::detect_upload))
        .route("/api/detect/url", post(routes::detect_url))
        .route("/api/model/status", get(routes::model_status))
        .route("/api/model/config", post(routes::reconfigure))
        .layer(body_limit)
        .with_state(state)
}
