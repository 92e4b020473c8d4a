//! In-memory repositories and router wiring shared by the HTTP tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderName, Method, Request, Response, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use time::{Duration, OffsetDateTime, macros::datetime};
use tower::ServiceExt;
use yatube::{
    application::{
        chrome::ChromeService,
        feed::FeedService,
        follow::FollowService,
        posts::PostService,
        repos::{
            BlobStore, BlobStoreError, CommentsRepo, CreateCommentParams, CreatePostParams,
            CreateUserParams, FollowsRepo, GroupsRepo, HealthRepo, PostFilter, PostSlice,
            PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams, UsersRepo,
        },
        viewer::ViewerService,
    },
    cache::{PageCacheConfig, PageCacheState},
    domain::{
        entities::{AuthorRef, CommentRecord, GroupRecord, GroupRef, PostRecord, UserRecord},
        groups::NewGroup,
        types::{CommentId, GroupId, PostId, UserId},
    },
    infra::http::{AdminState, AuthPolicy, HttpState, build_admin_router, build_router},
};

pub const USER_HEADER: &str = "x-remote-user";
pub const HOST: &str = "yatube.test";

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<(UserId, UserId)>,
    blobs: HashMap<String, Bytes>,
    ticks: i64,
    fail_post_writes: bool,
}

impl Tables {
    fn tick(&mut self) -> OffsetDateTime {
        self.ticks += 1;
        datetime!(2024-01-01 00:00 UTC) + Duration::minutes(self.ticks)
    }

    fn author_ref(&self, id: UserId) -> Result<AuthorRef, RepoError> {
        self.users
            .iter()
            .find(|user| user.id == id)
            .map(|user| AuthorRef {
                id: user.id,
                username: user.username.clone(),
            })
            .ok_or_else(|| RepoError::Integrity {
                message: format!("unknown user {id}"),
            })
    }

    fn group_ref(&self, id: Option<GroupId>) -> Result<Option<GroupRef>, RepoError> {
        let Some(id) = id else {
            return Ok(None);
        };
        self.groups
            .iter()
            .find(|group| group.id == id)
            .map(|group| {
                Some(GroupRef {
                    id: group.id,
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                })
            })
            .ok_or_else(|| RepoError::Integrity {
                message: format!("unknown group {id}"),
            })
    }

    fn matching(&self, filter: PostFilter) -> Vec<PostRecord> {
        let mut posts: Vec<PostRecord> = self
            .posts
            .iter()
            .filter(|post| match filter {
                PostFilter::All => true,
                PostFilter::Group(id) => post.group.as_ref().is_some_and(|group| group.id == id),
                PostFilter::Author(id) => post.author.id == id,
                PostFilter::FollowedBy(user) => self
                    .follows
                    .iter()
                    .any(|(follower, author)| *follower == user && *author == post.author.id),
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }
}

/// Thread-safe in-memory stand-in for every repository and the blob store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store lock")
    }

    pub fn add_user(&self, username: &str) -> UserRecord {
        let mut tables = self.lock();
        let created_at = tables.tick();
        let user = UserRecord {
            id: UserId(tables.users.len() as i64 + 1),
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            created_at,
        };
        tables.users.push(user.clone());
        user
    }

    pub fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut tables = self.lock();
        let group = GroupRecord {
            id: GroupId(tables.groups.len() as i64 + 1),
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("All about {title}"),
        };
        tables.groups.push(group.clone());
        group
    }

    pub fn add_post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        let mut tables = self.lock();
        let pub_date = tables.tick();
        let post = PostRecord {
            id: PostId(tables.posts.len() as i64 + 1),
            text: text.to_string(),
            pub_date,
            author: AuthorRef {
                id: author.id,
                username: author.username.clone(),
            },
            group: group.map(|group| GroupRef {
                id: group.id,
                slug: group.slug.clone(),
                title: group.title.clone(),
            }),
            image: None,
        };
        tables.posts.push(post.clone());
        post
    }

    pub fn follow_edge(&self, user: UserId, author: UserId) {
        self.lock().follows.push((user, author));
    }

    pub fn follow_count(&self) -> usize {
        self.lock().follows.len()
    }

    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }

    pub fn post(&self, id: PostId) -> Option<PostRecord> {
        self.lock().posts.iter().find(|post| post.id == id).cloned()
    }

    pub fn latest_post(&self) -> Option<PostRecord> {
        self.lock().posts.last().cloned()
    }

    pub fn blob_paths(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    pub fn fail_post_writes(&self) {
        self.lock().fail_post_writes = true;
    }

    pub fn set_post_text(&self, id: PostId, text: &str) {
        let mut tables = self.lock();
        if let Some(post) = tables.posts.iter_mut().find(|post| post.id == id) {
            post.text = text.to_string();
        }
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(
        &self,
        filter: PostFilter,
        slice: PostSlice,
    ) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self
            .lock()
            .matching(filter)
            .into_iter()
            .skip(slice.offset as usize)
            .take(slice.limit as usize)
            .collect())
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        Ok(self.lock().matching(filter).len() as u64)
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.post(id))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        if tables.fail_post_writes {
            return Err(RepoError::Persistence("post writes disabled".to_string()));
        }
        let author = tables.author_ref(params.author_id)?;
        let group = tables.group_ref(params.group_id)?;
        let pub_date = tables.tick();
        let post = PostRecord {
            id: PostId(tables.posts.len() as i64 + 1),
            text: params.text,
            pub_date,
            author,
            group,
            image: params.image,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.lock();
        if tables.fail_post_writes {
            return Err(RepoError::Persistence("post writes disabled".to_string()));
        }
        let group = tables.group_ref(params.group_id)?;
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group = group;
        if params.image.is_some() {
            post.image = params.image;
        }
        Ok(post.clone())
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_or_create(&self, username: &str) -> Result<UserRecord, RepoError> {
        if let Some(user) = UsersRepo::find_by_username(self, username).await? {
            return Ok(user);
        }
        Ok(self.add_user(username))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        if UsersRepo::find_by_username(self, &params.username)
            .await?
            .is_some()
        {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let mut user = self.add_user(&params.username);
        user.first_name = params.first_name;
        user.last_name = params.last_name;
        user.email = params.email;
        let mut tables = self.lock();
        if let Some(stored) = tables.users.iter_mut().find(|stored| stored.id == user.id) {
            *stored = user.clone();
        }
        Ok(user)
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: GroupId) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|group| group.id == id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn create_group(&self, group: NewGroup) -> Result<GroupRecord, RepoError> {
        Ok(self.add_group(&group.title, &group.slug))
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: PostId) -> Result<Vec<CommentRecord>, RepoError> {
        Ok(self
            .lock()
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = self.lock();
        let author = tables.author_ref(params.author_id)?;
        let created = tables.tick();
        let comment = CommentRecord {
            id: CommentId(tables.comments.len() as i64 + 1),
            post_id: params.post_id,
            author,
            text: params.text,
            created,
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn insert_follow(&self, user: UserId, author: UserId) -> Result<bool, RepoError> {
        if user == author {
            return Err(RepoError::Integrity {
                message: "follows_no_self_follow".to_string(),
            });
        }
        let mut tables = self.lock();
        if tables.follows.contains(&(user, author)) {
            return Ok(false);
        }
        tables.follows.push((user, author));
        Ok(true)
    }

    async fn delete_follow(&self, user: UserId, author: UserId) -> Result<bool, RepoError> {
        let mut tables = self.lock();
        let before = tables.follows.len();
        tables.follows.retain(|edge| *edge != (user, author));
        Ok(tables.follows.len() != before)
    }

    async fn follow_exists(&self, user: UserId, author: UserId) -> Result<bool, RepoError> {
        Ok(self.lock().follows.contains(&(user, author)))
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn store(
        &self,
        directory: &str,
        original_name: &str,
        data: Bytes,
    ) -> Result<String, BlobStoreError> {
        if data.is_empty() {
            return Err(BlobStoreError::EmptyPayload);
        }
        let mut tables = self.lock();
        let path = format!("{directory}/{}-{original_name}", tables.blobs.len() + 1);
        tables.blobs.insert(path.clone(), data);
        Ok(path)
    }

    async fn read(&self, path: &str) -> Result<Bytes, BlobStoreError> {
        self.lock()
            .blobs
            .get(path)
            .cloned()
            .ok_or(BlobStoreError::NotFound)
    }

    async fn remove(&self, path: &str) -> Result<(), BlobStoreError> {
        self.lock()
            .blobs
            .remove(path)
            .map(drop)
            .ok_or(BlobStoreError::NotFound)
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub public: Router,
    pub admin: Router,
}

pub struct TestOptions {
    pub page_size: u64,
    pub cache_enabled: bool,
    pub login_url: Option<String>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            cache_enabled: true,
            login_url: None,
        }
    }
}

pub fn app() -> TestApp {
    app_with(TestOptions::default())
}

pub fn app_with(options: TestOptions) -> TestApp {
    let store = Arc::new(MemoryStore::default());

    let feed = Arc::new(FeedService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        options.page_size,
    ));
    let follows = Arc::new(FollowService::new(store.clone(), store.clone()));
    let posts = Arc::new(PostService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    ));
    let viewers = Arc::new(ViewerService::new(store.clone()));
    let chrome = Arc::new(ChromeService::new("Yatube"));
    let cache = options.cache_enabled.then(|| {
        PageCacheState::new(PageCacheConfig {
            enabled: true,
            ..PageCacheConfig::default()
        })
    });

    let http_state = HttpState {
        feed,
        follows,
        posts,
        viewers,
        chrome,
        blobs: store.clone(),
        cache: cache.clone(),
        auth: AuthPolicy {
            user_header: HeaderName::from_static(USER_HEADER),
            login_url: options.login_url,
            trusted_origins: Vec::new(),
        },
        upload_limit_bytes: 10 * 1024 * 1024,
    };
    let admin_state = AdminState {
        health: store.clone(),
        cache,
    };

    TestApp {
        public: build_router(http_state),
        admin: build_admin_router(admin_state),
        store,
    }
}

pub fn get(uri: &str, viewer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::HOST, HOST);
    if let Some(viewer) = viewer {
        builder = builder.header(USER_HEADER, viewer);
    }
    builder.body(Body::empty()).expect("request should build")
}

pub fn post_form(uri: &str, viewer: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::HOST, HOST)
        .header(header::ORIGIN, format!("http://{HOST}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(viewer) = viewer {
        builder = builder.header(USER_HEADER, viewer);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub const BOUNDARY: &str = "yatube-test-boundary";

/// A multipart body with text fields and an optional `image` file part.
pub fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn post_multipart(uri: &str, viewer: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::HOST, HOST)
        .header(header::ORIGIN, format!("http://{HOST}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(viewer) = viewer {
        builder = builder.header(USER_HEADER, viewer);
    }
    builder.body(Body::from(body)).expect("request should build")
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

/// Number of post cards rendered on a listing page.
pub fn card_count(html: &str) -> usize {
    html.matches("<article>").count()
}

/// A 1x1 transparent GIF.
pub const TINY_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];
