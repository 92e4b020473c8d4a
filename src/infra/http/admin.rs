//! Operator-only listener: database health and page cache control.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::info;

use crate::{application::repos::HealthRepo, cache::PageCacheState};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct AdminState {
    pub health: Arc<dyn HealthRepo>,
    pub cache: Option<PageCacheState>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/_health/db", get(admin_health))
        .route("/cache/clear", post(clear_page_cache))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn clear_page_cache(State(state): State<AdminState>) -> Response {
    if let Some(cache_state) = state.cache.as_ref() {
        let removed = cache_state.cache.clear();
        info!(
            target = "yatube::http::admin",
            removed = removed,
            "page cache cleared"
        );
    }
    StatusCode::NO_CONTENT.into_response()
}
