//! Extractors exposing the resolved viewer to handlers.

use axum::{
    extract::FromRequestParts,
    http::{HeaderName, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use url::form_urlencoded::byte_serialize;

use crate::{
    application::viewer::{Viewer, ViewerContext},
    config::AuthSettings,
};

use super::{middleware::forbidden, public::HttpState};

/// How the public router learns who is asking and where anonymous visitors go.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub user_header: HeaderName,
    pub login_url: Option<String>,
    pub trusted_origins: Vec<String>,
}

impl From<&AuthSettings> for AuthPolicy {
    fn from(settings: &AuthSettings) -> Self {
        Self {
            user_header: settings.user_header.clone(),
            login_url: settings.login_url.clone(),
            trusted_origins: settings.trusted_origins.clone(),
        }
    }
}

impl AuthPolicy {
    /// Location of the login page, remembering where the visitor was headed.
    pub fn login_redirect(&self, next: &str) -> Option<String> {
        self.login_url.as_deref().map(|login| {
            let next: String = byte_serialize(next.as_bytes()).collect();
            let separator = if login.contains('?') { '&' } else { '?' };
            format!("{login}{separator}next={next}")
        })
    }
}

/// The viewer, if any. Never rejects.
pub struct CurrentViewer(pub Option<Viewer>);

impl<S> FromRequestParts<S> for CurrentViewer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let viewer = parts
            .extensions
            .get::<ViewerContext>()
            .and_then(|ctx| ctx.viewer.clone());
        Ok(Self(viewer))
    }
}

/// An authenticated viewer. Anonymous requests are sent to the login page,
/// or refused when no login page is configured.
pub struct RequireViewer(pub Viewer);

impl FromRequestParts<HttpState> for RequireViewer {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(viewer) = parts
            .extensions
            .get::<ViewerContext>()
            .and_then(|ctx| ctx.viewer.clone())
        {
            return Ok(Self(viewer));
        }

        let next = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        match state.auth.login_redirect(next) {
            Some(location) => Err(Redirect::to(&location).into_response()),
            None => Err(forbidden(
                "infra::http::viewer::RequireViewer",
                "You need to sign in to do that.",
            )),
        }
    }
}
