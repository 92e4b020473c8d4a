use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    application::{
        error::{ErrorPage, ErrorReport, HttpError},
        viewer::ViewerContext,
    },
    presentation::views::{ErrorPageView, render_error_response},
};

use super::public::HttpState;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let viewer = response
            .extensions()
            .get::<ViewerContext>()
            .and_then(ViewerContext::username)
            .unwrap_or("")
            .to_string();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = viewer,
                "request failed",
            );
        } else {
            warn!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = viewer,
                "client request error",
            );
        }
    }

    response
}

/// Resolve the upstream identity header into a [`ViewerContext`] extension.
pub async fn resolve_viewer(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let asserted = request
        .headers()
        .get(&state.auth.user_header)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let viewer = match state.viewers.resolve(asserted.as_deref()).await {
        Ok(viewer) => viewer,
        Err(err) => {
            return HttpError::from_repo("infra::http::middleware::resolve_viewer", &err)
                .into_response();
        }
    };

    let ctx = ViewerContext { viewer };
    request.extensions_mut().insert(ctx.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Re-render bare error responses as full pages inside the site layout.
pub async fn render_error_pages(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;
    let Some(page) = response.extensions_mut().remove::<ErrorPage>() else {
        return response;
    };

    let status = response.status();
    let report = response.extensions_mut().remove::<ErrorReport>();
    let ctx = response
        .extensions()
        .get::<ViewerContext>()
        .cloned()
        .unwrap_or_default();

    let chrome = state.chrome.load(ctx.viewer.as_ref());
    let content = ErrorPageView::for_kind(page.kind, page.message, &path);
    let mut rendered = render_error_response(chrome, status, content, report);
    rendered.extensions_mut().insert(ctx);
    rendered
}

/// Refuse state-changing requests that originate from another site.
pub async fn reject_cross_origin_posts(
    state: State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if is_safe_method(request.method()) {
        return next.run(request).await;
    }
    reject_cross_origin_requests(state, request, next).await
}

/// Refuse any request from another site, whatever its method. Guards routes
/// that mutate state on GET.
pub async fn reject_cross_origin_requests(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    const SOURCE: &str = "infra::http::middleware::reject_cross_origin_requests";

    let headers = request.headers();
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_ascii_lowercase);

    if headers
        .get("sec-fetch-site")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("cross-site"))
    {
        return HttpError::csrf_failure(SOURCE, "sec-fetch-site reported a cross-site request")
            .into_response();
    }

    let claimed = headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))
        .and_then(|value| value.to_str().ok());

    if let Some(claimed) = claimed
        && !origin_allowed(claimed, host.as_deref(), &state.auth.trusted_origins)
    {
        return HttpError::csrf_failure(
            SOURCE,
            format!("origin `{claimed}` does not match host `{}`", host.unwrap_or_default()),
        )
        .into_response();
    }

    next.run(request).await
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// An origin (or referer) is allowed when it names the requested host or a
/// configured trusted origin. `null` origins are never allowed.
fn origin_allowed(claimed: &str, host: Option<&str>, trusted: &[String]) -> bool {
    let Ok(url) = Url::parse(claimed) else {
        return false;
    };
    let Some(claimed_host) = url.host_str() else {
        return false;
    };

    let authority = match url.port() {
        Some(port) => format!("{claimed_host}:{port}").to_ascii_lowercase(),
        None => claimed_host.to_ascii_lowercase(),
    };
    if host.is_some_and(|host| host == authority) {
        return true;
    }

    let origin = url.origin().ascii_serialization().to_ascii_lowercase();
    trusted.iter().any(|trusted| *trusted == origin)
}

pub(super) fn forbidden(source: &'static str, message: &'static str) -> Response {
    HttpError::new(source, StatusCode::FORBIDDEN, message, message).into_response()
}
