use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain entity `{entity}` not found")]
    NotFound { entity: &'static str },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }
}

/// Uniform "find or NotFound" conversion for optional lookups.
///
/// Every repository lookup by identifier returns `Option<T>`; callers that
/// require the entity go through this trait so a missing group, user or post
/// always surfaces as the same typed error.
pub trait OrNotFound<T> {
    fn or_not_found(self, entity: &'static str) -> Result<T, DomainError>;
}

impl<T> OrNotFound<T> for Option<T> {
    fn or_not_found(self, entity: &'static str) -> Result<T, DomainError> {
        self.ok_or(DomainError::NotFound { entity })
    }
}
