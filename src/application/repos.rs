//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::groups::NewGroup;
use crate::domain::types::{GroupId, PostId, UserId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which posts a feed listing draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(GroupId),
    Author(UserId),
    /// Posts whose author is followed by the given user.
    FollowedBy(UserId),
}

/// Offset window into an ordered post listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostSlice {
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: UserId,
    pub text: String,
    pub group_id: Option<GroupId>,
    pub image: Option<String>,
}

/// Author and publication date are not part of an update.
#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: PostId,
    pub text: String,
    pub group_id: Option<GroupId>,
    /// `None` keeps the stored image.
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: PostId,
    pub author_id: UserId,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct CreateUserParams {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Posts matching `filter`, ordered by `pub_date DESC, id DESC`.
    async fn list_posts(
        &self,
        filter: PostFilter,
        slice: PostSlice,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError>;

    async fn find_by_id(&self, id: PostId) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RepoError>;

    /// Returns the existing user or provisions one with empty profile fields.
    async fn find_or_create(&self, username: &str) -> Result<UserRecord, RepoError>;

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn find_by_id(&self, id: GroupId) -> Result<Option<GroupRecord>, RepoError>;

    /// All groups ordered by title.
    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError>;

    async fn create_group(&self, group: NewGroup) -> Result<GroupRecord, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments on `post_id`, oldest first.
    async fn list_for_post(&self, post_id: PostId) -> Result<Vec<CommentRecord>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    /// Returns `false` when the edge already existed.
    async fn insert_follow(&self, user: UserId, author: UserId) -> Result<bool, RepoError>;

    /// Returns `false` when there was no edge to remove.
    async fn delete_follow(&self, user: UserId, author: UserId) -> Result<bool, RepoError>;

    async fn follow_exists(&self, user: UserId, author: UserId) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("stored blob not found")]
    NotFound,
    #[error("blob payload is empty")]
    EmptyPayload,
    #[error("blob storage failure: {0}")]
    Backend(String),
}

/// Storage for uploaded post images, addressed by relative paths.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `directory` and return the relative path it was saved at.
    async fn store(
        &self,
        directory: &str,
        original_name: &str,
        data: Bytes,
    ) -> Result<String, BlobStoreError>;

    async fn read(&self, stored_path: &str) -> Result<Bytes, BlobStoreError>;

    async fn remove(&self, stored_path: &str) -> Result<(), BlobStoreError>;
}
