use std::sync::Arc;

use thiserror::Error;

use crate::application::error::HttpError;
use crate::application::pagination::{Page, PageWindow};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostFilter, PostSlice, PostsRepo, RepoError, UsersRepo,
};
use crate::application::viewer::Viewer;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::error::{DomainError, OrNotFound};
use crate::domain::types::PostId;

const SOURCE: &str = "application::feed::FeedService";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        match error {
            FeedError::Domain(err) => HttpError::from_domain(SOURCE, &err),
            FeedError::Repo(err) => HttpError::from_repo(SOURCE, &err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct ProfileFeed {
    pub author: UserRecord,
    pub page: Page<PostRecord>,
    pub post_count: u64,
    pub is_following: bool,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub author_post_count: u64,
    pub comments: Vec<CommentRecord>,
}

/// Read side of the site: every listing and the post detail view.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    page_size: u64,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        page_size: u64,
    ) -> Self {
        Self {
            posts,
            users,
            groups,
            comments,
            follows,
            page_size,
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Every post, newest first.
    pub async fn home(&self, page: Option<&str>) -> Result<Page<PostRecord>, FeedError> {
        self.paginate(PostFilter::All, page).await
    }

    pub async fn group(&self, slug: &str, page: Option<&str>) -> Result<GroupFeed, FeedError> {
        let group = self.groups.find_by_slug(slug).await?.or_not_found("group")?;
        let page = self.paginate(PostFilter::Group(group.id), page).await?;
        Ok(GroupFeed { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&Viewer>,
        page: Option<&str>,
    ) -> Result<ProfileFeed, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .or_not_found("user")?;
        let page = self.paginate(PostFilter::Author(author.id), page).await?;
        let post_count = page.window.total;

        let is_following = match viewer {
            Some(viewer) => self.follows.follow_exists(viewer.id, author.id).await?,
            None => false,
        };

        Ok(ProfileFeed {
            author,
            page,
            post_count,
            is_following,
        })
    }

    /// Posts by authors the viewer follows; anonymous viewers get an empty page.
    pub async fn followed(
        &self,
        viewer: Option<&Viewer>,
        page: Option<&str>,
    ) -> Result<Page<PostRecord>, FeedError> {
        match viewer {
            Some(viewer) => self.paginate(PostFilter::FollowedBy(viewer.id), page).await,
            None => Ok(Page::new(
                Vec::new(),
                PageWindow::resolve(0, self.page_size, page),
            )),
        }
    }

    pub async fn post_detail(&self, id: PostId) -> Result<PostDetail, FeedError> {
        let post = self.posts.find_by_id(id).await?.or_not_found("post")?;
        let author_post_count = self
            .posts
            .count_posts(PostFilter::Author(post.author.id))
            .await?;
        let comments = self.comments.list_for_post(post.id).await?;

        Ok(PostDetail {
            post,
            author_post_count,
            comments,
        })
    }

    async fn paginate(
        &self,
        filter: PostFilter,
        page: Option<&str>,
    ) -> Result<Page<PostRecord>, FeedError> {
        let total = self.posts.count_posts(filter).await?;
        let window = PageWindow::resolve(total, self.page_size, page);
        if window.is_empty() {
            return Ok(Page::new(Vec::new(), window));
        }

        let items = self
            .posts
            .list_posts(
                filter,
                PostSlice {
                    limit: window.limit(),
                    offset: window.offset(),
                },
            )
            .await?;
        Ok(Page::new(items, window))
    }
}
