//! Response cache middleware for the home listing.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};

use super::{
    PageCacheConfig,
    keys::PageCacheKey,
    store::{CachedResponse, PageCache},
};
use crate::application::viewer::ViewerContext;

#[derive(Clone)]
pub struct PageCacheState {
    pub config: PageCacheConfig,
    pub cache: Arc<PageCache>,
}

impl PageCacheState {
    pub fn new(config: PageCacheConfig) -> Self {
        let cache = Arc::new(PageCache::new(&config));
        Self { config, cache }
    }
}

/// Serve GET requests from the page cache, storing fresh 200 responses.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(state): State<PageCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let viewer = request
        .extensions()
        .get::<ViewerContext>()
        .and_then(ViewerContext::username)
        .map(str::to_string);
    let key = PageCacheKey::new(
        request.uri().path(),
        request.uri().query(),
        viewer.as_deref(),
    );

    if let Some(cached) = state.cache.get(&key) {
        debug!(cache = "page", outcome = "hit", key = %key, "serving cached page");
        return build_response(cached);
    }

    debug!(cache = "page", outcome = "miss", key = %key, "rendering page");
    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, state.config.body_limit_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(cache = "page", error = %err, "response body could not be buffered");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            return response;
        }
    };

    state.cache.insert(
        key,
        CachedResponse {
            status: parts.status.as_u16(),
            headers: parts
                .headers
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.to_string(), value.to_string()))
                })
                .collect(),
            body: bytes.clone(),
        },
    );

    Response::from_parts(parts, Body::from(bytes))
}

fn build_response(cached: CachedResponse) -> Response {
    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);
    let headers = response.headers_mut();
    for (name, value) in cached.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(&value),
        ) {
            headers.append(name, value);
        }
    }
    response
}
