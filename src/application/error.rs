use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{application::repos::RepoError, domain::error::DomainError, infra::error::InfraError};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Which error page the public site renders for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPageKind {
    BadRequest,
    Forbidden,
    CsrfFailure,
    NotFound,
    Unavailable,
    Internal,
}

impl ErrorPageKind {
    pub fn for_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::BadRequest,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::SERVICE_UNAVAILABLE => Self::Unavailable,
            _ => Self::Internal,
        }
    }
}

/// Marker left on error responses so the page decorator can render them
/// inside the site layout.
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub kind: ErrorPageKind,
    pub message: &'static str,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    kind: ErrorPageKind,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            kind: ErrorPageKind::for_status(status),
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            kind: ErrorPageKind::for_status(status),
            public_message,
            report,
        }
    }

    pub fn csrf_failure(source: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorPageKind::CsrfFailure,
            ..Self::new(
                source,
                StatusCode::FORBIDDEN,
                "CSRF verification failed",
                detail,
            )
        }
    }

    pub fn from_domain(source: &'static str, error: &DomainError) -> Self {
        match error {
            DomainError::NotFound { .. } => {
                Self::from_error(source, StatusCode::NOT_FOUND, "Page not found", error)
            }
            DomainError::PermissionDenied { .. } => {
                Self::from_error(source, StatusCode::FORBIDDEN, "Access denied", error)
            }
            DomainError::Validation { .. } => Self::from_error(
                source,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                error,
            ),
        }
    }

    pub fn from_repo(source: &'static str, error: &RepoError) -> Self {
        match error {
            RepoError::Timeout => Self::from_error(
                source,
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
                error,
            ),
            RepoError::NotFound => {
                Self::from_error(source, StatusCode::NOT_FOUND, "Page not found", error)
            }
            _ => Self::from_error(
                source,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                error,
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> ErrorPageKind {
        self.kind
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        response.extensions_mut().insert(ErrorPage {
            kind: self.kind,
            message: self.public_message,
        });
        self.report.attach(&mut response);
        response
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_collects_error_chain() {
        let inner = std::io::Error::other("disk full");
        let outer = InfraError::from(inner);
        let report =
            ErrorReport::from_error("tests", StatusCode::INTERNAL_SERVER_ERROR, &outer);
        assert_eq!(report.messages.len(), 2);
        assert!(report.messages[1].contains("disk full"));
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let not_found = HttpError::from_domain("tests", &DomainError::not_found("group"));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.kind(), ErrorPageKind::NotFound);

        let denied =
            HttpError::from_domain("tests", &DomainError::permission_denied("not the author"));
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn csrf_failure_is_a_distinct_forbidden_page() {
        let error = HttpError::csrf_failure("tests", "origin mismatch");
        assert_eq!(error.status(), StatusCode::FORBIDDEN);
        assert_eq!(error.kind(), ErrorPageKind::CsrfFailure);

        let response = error.into_response();
        let page = response.extensions().get::<ErrorPage>().unwrap();
        assert_eq!(page.kind, ErrorPageKind::CsrfFailure);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
