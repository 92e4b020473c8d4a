//! Follow edge management.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::error::HttpError;
use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::application::viewer::Viewer;
use crate::domain::entities::UserRecord;
use crate::domain::error::{DomainError, OrNotFound};

const SOURCE: &str = "application::follow::FollowService";

#[derive(Debug, Error)]
pub enum FollowError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        match error {
            FollowError::Domain(err) => HttpError::from_domain(SOURCE, &err),
            FollowError::Repo(err) => HttpError::from_repo(SOURCE, &err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollowIgnored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Removed,
    NotFollowing,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    /// Create the edge `viewer -> username`. Following yourself is a no-op.
    pub async fn follow(
        &self,
        viewer: &Viewer,
        username: &str,
    ) -> Result<(UserRecord, FollowOutcome), FollowError> {
        let author = self.target(username).await?;
        if author.id == viewer.id {
            return Ok((author, FollowOutcome::SelfFollowIgnored));
        }

        let outcome = if self.follows.insert_follow(viewer.id, author.id).await? {
            info!(
                target = "yatube::application::follow",
                follower = %viewer.username,
                author = %author.username,
                "follow edge created"
            );
            FollowOutcome::Created
        } else {
            FollowOutcome::AlreadyFollowing
        };
        Ok((author, outcome))
    }

    /// Remove the edge `viewer -> username` if it exists.
    pub async fn unfollow(
        &self,
        viewer: &Viewer,
        username: &str,
    ) -> Result<(UserRecord, UnfollowOutcome), FollowError> {
        let author = self.target(username).await?;
        let outcome = if self.follows.delete_follow(viewer.id, author.id).await? {
            info!(
                target = "yatube::application::follow",
                follower = %viewer.username,
                author = %author.username,
                "follow edge removed"
            );
            UnfollowOutcome::Removed
        } else {
            UnfollowOutcome::NotFollowing
        };
        Ok((author, outcome))
    }

    async fn target(&self, username: &str) -> Result<UserRecord, FollowError> {
        Ok(self
            .users
            .find_by_username(username)
            .await?
            .or_not_found("user")?)
    }
}
