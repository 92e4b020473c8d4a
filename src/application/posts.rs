//! Write side: post creation, author-only edits and comments.

use std::sync::Arc;

use axum::http::StatusCode;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::error::HttpError;
use crate::application::repos::{
    BlobStore, BlobStoreError, CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo,
    PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::application::viewer::Viewer;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use crate::domain::error::{DomainError, OrNotFound};
use crate::domain::posts::{TEXT_REQUIRED_MESSAGE, normalize_text};
use crate::domain::types::{GroupId, PostId};

const SOURCE: &str = "application::posts::PostService";

/// Directory inside the blob store that holds post images.
pub const POST_IMAGE_DIRECTORY: &str = "posts";

pub const INVALID_CHOICE_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub data: Bytes,
}

/// Raw values submitted with the post form.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    /// Selected group id, empty when no group was chosen.
    pub group: String,
    pub image: Option<ImageUpload>,
}

/// Field-level validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub text: Vec<String>,
    pub group: Vec<String>,
    pub image: Vec<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.group.is_empty() && self.image.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("submitted form is invalid")]
    Invalid(FormErrors),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("failed to store image: {0}")]
    Storage(#[from] BlobStoreError),
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        match error {
            PostError::Domain(err) => HttpError::from_domain(SOURCE, &err),
            PostError::Repo(err) => HttpError::from_repo(SOURCE, &err),
            PostError::Invalid(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                &error,
            ),
            PostError::Storage(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &error,
            ),
        }
    }
}

struct ValidPost {
    text: String,
    group_id: Option<GroupId>,
    image: Option<ImageUpload>,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    blobs: Arc<dyn BlobStore>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            comments,
            blobs,
        }
    }

    /// Groups offered by the post form select.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_all().await?)
    }

    pub async fn create(&self, viewer: &Viewer, form: &PostForm) -> Result<PostRecord, PostError> {
        let valid = self.validate(form).await?;
        let image = self.store_image(valid.image).await?;

        let post = match self
            .writer
            .create_post(CreatePostParams {
                author_id: viewer.id,
                text: valid.text,
                group_id: valid.group_id,
                image: image.clone(),
            })
            .await
        {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(image.as_deref()).await;
                return Err(err.into());
            }
        };

        info!(
            target = "yatube::application::posts",
            post_id = %post.id,
            author = %viewer.username,
            "post created"
        );
        Ok(post)
    }

    /// Load a post for editing; only its author may edit it.
    pub async fn editable(&self, viewer: &Viewer, id: PostId) -> Result<PostRecord, PostError> {
        let post = self.reader.find_by_id(id).await?.or_not_found("post")?;
        if !post.is_authored_by(viewer.id) {
            return Err(DomainError::permission_denied(format!(
                "user `{}` is not the author of post {}",
                viewer.username, post.id
            ))
            .into());
        }
        Ok(post)
    }

    pub async fn edit(
        &self,
        viewer: &Viewer,
        id: PostId,
        form: &PostForm,
    ) -> Result<PostRecord, PostError> {
        let post = self.editable(viewer, id).await?;
        let valid = self.validate(form).await?;
        let image = self.store_image(valid.image).await?;

        let updated = match self
            .writer
            .update_post(UpdatePostParams {
                id: post.id,
                text: valid.text,
                group_id: valid.group_id,
                image: image.clone(),
            })
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                self.discard_image(image.as_deref()).await;
                return Err(err.into());
            }
        };

        info!(
            target = "yatube::application::posts",
            post_id = %updated.id,
            author = %viewer.username,
            "post edited"
        );
        Ok(updated)
    }

    pub async fn comment(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        let post = self
            .reader
            .find_by_id(post_id)
            .await?
            .or_not_found("post")?;

        let Some(text) = normalize_text(text) else {
            return Err(PostError::Invalid(FormErrors {
                text: vec![TEXT_REQUIRED_MESSAGE.to_string()],
                ..FormErrors::default()
            }));
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: viewer.id,
                text,
            })
            .await?;
        Ok(comment)
    }

    async fn validate(&self, form: &PostForm) -> Result<ValidPost, PostError> {
        let mut errors = FormErrors::default();

        let text = normalize_text(&form.text);
        if text.is_none() {
            errors.text.push(TEXT_REQUIRED_MESSAGE.to_string());
        }

        let group_id = match form.group.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(id) => match self.groups.find_by_id(GroupId(id)).await? {
                    Some(group) => Some(group.id),
                    None => {
                        errors.group.push(INVALID_CHOICE_MESSAGE.to_string());
                        None
                    }
                },
                Err(_) => {
                    errors.group.push(INVALID_CHOICE_MESSAGE.to_string());
                    None
                }
            },
        };

        let image = form.image.clone().filter(|upload| !upload.data.is_empty());
        if let Some(upload) = &image
            && !is_decodable_image(&upload.data)
        {
            errors.image.push(INVALID_IMAGE_MESSAGE.to_string());
        }

        match text {
            Some(text) if errors.is_empty() => Ok(ValidPost {
                text,
                group_id,
                image,
            }),
            _ => Err(PostError::Invalid(errors)),
        }
    }

    async fn store_image(&self, image: Option<ImageUpload>) -> Result<Option<String>, PostError> {
        match image {
            Some(upload) => {
                let path = self
                    .blobs
                    .store(POST_IMAGE_DIRECTORY, &upload.file_name, upload.data)
                    .await?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    /// Remove an image stored for a write that did not go through.
    async fn discard_image(&self, path: Option<&str>) {
        let Some(path) = path else {
            return;
        };
        if let Err(err) = self.blobs.remove(path).await {
            warn!(
                target = "yatube::application::posts",
                path,
                error = %err,
                "failed to remove orphaned image"
            );
        }
    }
}

fn is_decodable_image(data: &[u8]) -> bool {
    imagesize::blob_size(data)
        .map(|size| size.width > 0 && size.height > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent GIF
    const GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
        0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
    ];

    #[test]
    fn recognises_real_images() {
        assert!(is_decodable_image(GIF));
    }

    #[test]
    fn rejects_non_images() {
        assert!(!is_decodable_image(b"definitely not an image"));
        assert!(!is_decodable_image(&[]));
    }

    #[test]
    fn empty_errors_are_empty() {
        assert!(FormErrors::default().is_empty());
        let errors = FormErrors {
            image: vec![INVALID_IMAGE_MESSAGE.to_string()],
            ..FormErrors::default()
        };
        assert!(!errors.is_empty());
    }
}
