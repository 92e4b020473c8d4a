//! Domain entities mirrored from persistent storage.

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::{CommentId, GroupId, PostId, UserId};

/// Number of characters of post text used for its short string form.
pub const POST_PREVIEW_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: OffsetDateTime,
}

impl UserRecord {
    /// Full name when one is known, otherwise the username.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for GroupRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Author columns joined onto a post row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorRef {
    pub id: UserId,
    pub username: String,
}

/// Group columns joined onto a post row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRef {
    pub id: GroupId,
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: PostId,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub author: AuthorRef,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
}

impl PostRecord {
    pub fn is_authored_by(&self, user: UserId) -> bool {
        self.author.id == user
    }
}

impl fmt::Display for PostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.text.chars().take(POST_PREVIEW_CHARS).collect();
        f.write_str(&preview)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: AuthorRef,
    pub text: String,
    pub created: OffsetDateTime,
}

/// Directed follow edge: `user` receives `author`'s posts in their feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FollowEdge {
    pub user: UserId,
    pub author: UserId,
}
