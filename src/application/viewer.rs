//! Resolution of the authenticated viewer from the upstream identity.

use std::sync::Arc;

use tracing::warn;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::types::UserId;
use crate::domain::users::validate_username;

/// The authenticated user making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: UserId,
    pub username: String,
}

impl From<&UserRecord> for Viewer {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ViewerService {
    users: Arc<dyn UsersRepo>,
}

impl ViewerService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self { users }
    }

    /// Map the identity asserted upstream to a stored user, provisioning it on
    /// first sight. Malformed identities are treated as anonymous.
    pub async fn resolve(&self, asserted: Option<&str>) -> Result<Option<Viewer>, RepoError> {
        let Some(raw) = asserted else {
            return Ok(None);
        };

        let username = match validate_username(raw) {
            Ok(username) => username,
            Err(err) => {
                warn!(
                    target = "yatube::application::viewer",
                    error = %err,
                    "ignoring malformed upstream identity"
                );
                return Ok(None);
            }
        };

        let user = self.users.find_or_create(username).await?;
        Ok(Some(Viewer::from(&user)))
    }
}

/// Request extension carrying the resolved viewer for downstream layers.
#[derive(Debug, Clone, Default)]
pub struct ViewerContext {
    pub viewer: Option<Viewer>,
}

impl ViewerContext {
    pub fn username(&self) -> Option<&str> {
        self.viewer.as_ref().map(|viewer| viewer.username.as_str())
    }
}
