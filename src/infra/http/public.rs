use std::sync::Arc;

use axum::{
    Form, Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::Multipart;
use bytes::Bytes;
use tracing::error;

use crate::{
    application::{
        chrome::ChromeService,
        error::HttpError,
        feed::FeedService,
        follow::FollowService,
        posts::{FormErrors, PostError, PostForm, PostService},
        repos::{BlobStore, BlobStoreError},
        viewer::{Viewer, ViewerService},
    },
    cache::{PageCacheState, page_cache_layer},
    domain::{entities::PostRecord, types::PostId},
    presentation::views::{
        AboutAuthorTemplate, AboutTechTemplate, CommentFormView, FeedView, GroupTemplate,
        GroupView, IndexTemplate, IndexView, LayoutContext, PostDetailTemplate, PostDetailView,
        PostFormTemplate, PostFormView, ProfileTemplate, ProfileView, render_template_response,
    },
};

use super::{
    forms::{CommentSubmission, PageQuery, read_post_form},
    middleware::{
        log_responses, reject_cross_origin_posts, reject_cross_origin_requests,
        render_error_pages, resolve_viewer, set_request_context,
    },
    viewer::{AuthPolicy, CurrentViewer, RequireViewer},
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub follows: Arc<FollowService>,
    pub posts: Arc<PostService>,
    pub viewers: Arc<ViewerService>,
    pub chrome: Arc<ChromeService>,
    pub blobs: Arc<dyn BlobStore>,
    pub cache: Option<PageCacheState>,
    pub auth: AuthPolicy,
    pub upload_limit_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the home listing is page-cached.
    let home = Router::new().route("/", get(index));
    let home = match state.cache.clone() {
        Some(cache_state) => home.route_layer(middleware::from_fn_with_state(
            cache_state,
            page_cache_layer,
        )),
        None => home,
    };

    // Follow edges change on GET too, so these routes check origin for every method.
    let follow_edges = Router::new()
        .route(
            "/profile/{username}/follow/",
            get(profile_follow).post(profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(profile_unfollow).post(profile_unfollow),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            reject_cross_origin_requests,
        ));

    Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/edit/", get(post_edit_form).post(post_edit))
        .route("/posts/{id}/comment/", post(add_comment))
        .route("/create/", get(post_create_form).post(post_create))
        .route("/follow/", get(follow_index))
        .route("/about/author/", get(about_author))
        .route("/about/tech/", get(about_tech))
        .route("/media/{*path}", get(serve_media))
        .merge(follow_edges)
        .merge(home)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            reject_cross_origin_posts,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_viewer))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            render_error_pages,
        ))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

fn parse_post_id(raw: &str) -> Result<PostId, HttpError> {
    raw.parse::<i64>().map(PostId).map_err(|_| {
        HttpError::new(
            "infra::http::public::parse_post_id",
            StatusCode::NOT_FOUND,
            "Page not found",
            format!("`{raw}` is not a post id"),
        )
    })
}

fn profile_location(username: &str) -> String {
    format!("/profile/{username}/")
}

fn post_location(id: PostId) -> String {
    format!("/posts/{id}/")
}

async fn index(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    query: PageQuery,
) -> Result<Response, HttpError> {
    let page = state.feed.home(query.page.as_deref()).await?;
    let content = IndexView {
        heading: "Latest updates on the site",
        active_tab: "index",
        feed: FeedView::from_page(&page),
    };
    let view = LayoutContext::new(state.chrome.load(viewer.as_ref()), content);
    Ok(render_template_response(IndexTemplate { view }, StatusCode::OK))
}

async fn follow_index(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    query: PageQuery,
) -> Result<Response, HttpError> {
    let page = state
        .feed
        .followed(Some(&viewer), query.page.as_deref())
        .await?;
    let content = IndexView {
        heading: "Posts by authors you follow",
        active_tab: "follow",
        feed: FeedView::from_page(&page),
    };
    let view = LayoutContext::new(state.chrome.load(Some(&viewer)), content);
    Ok(render_template_response(IndexTemplate { view }, StatusCode::OK))
}

async fn group_posts(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(slug): Path<String>,
    query: PageQuery,
) -> Result<Response, HttpError> {
    let feed = state.feed.group(&slug, query.page.as_deref()).await?;
    let view = LayoutContext::new(
        state.chrome.load(viewer.as_ref()),
        GroupView::from_feed(&feed),
    );
    Ok(render_template_response(GroupTemplate { view }, StatusCode::OK))
}

async fn profile(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(username): Path<String>,
    query: PageQuery,
) -> Result<Response, HttpError> {
    let feed = state
        .feed
        .profile(&username, viewer.as_ref(), query.page.as_deref())
        .await?;
    let content = ProfileView::from_feed(&feed, viewer.as_ref().map(|v| v.username.as_str()));
    let view = LayoutContext::new(state.chrome.load(viewer.as_ref()), content);
    Ok(render_template_response(ProfileTemplate { view }, StatusCode::OK))
}

async fn profile_follow(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Path(username): Path<String>,
) -> Result<Redirect, HttpError> {
    let (author, _) = state.follows.follow(&viewer, &username).await?;
    Ok(Redirect::to(&profile_location(&author.username)))
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Path(username): Path<String>,
) -> Result<Redirect, HttpError> {
    let (author, _) = state.follows.unfollow(&viewer, &username).await?;
    Ok(Redirect::to(&profile_location(&author.username)))
}

async fn post_detail(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let id = parse_post_id(&id)?;
    render_post_detail(
        &state,
        viewer.as_ref(),
        id,
        CommentFormView::default(),
        StatusCode::OK,
    )
    .await
}

async fn render_post_detail(
    state: &HttpState,
    viewer: Option<&Viewer>,
    id: PostId,
    comment_form: CommentFormView,
    status: StatusCode,
) -> Result<Response, HttpError> {
    let detail = state.feed.post_detail(id).await?;
    let content = PostDetailView::from_detail(
        &detail,
        viewer.map(|viewer| viewer.username.as_str()),
        comment_form,
    );
    let view = LayoutContext::new(state.chrome.load(viewer), content);
    Ok(render_template_response(PostDetailTemplate { view }, status))
}

async fn add_comment(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<String>,
    Form(submission): Form<CommentSubmission>,
) -> Result<Response, HttpError> {
    let id = parse_post_id(&id)?;
    match state.posts.comment(&viewer, id, &submission.text).await {
        Ok(_) => Ok(Redirect::to(&post_location(id)).into_response()),
        Err(PostError::Invalid(errors)) => {
            let form = CommentFormView {
                text: submission.text,
                errors: errors.text,
            };
            render_post_detail(&state, Some(&viewer), id, form, StatusCode::BAD_REQUEST).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn post_create_form(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
) -> Result<Response, HttpError> {
    render_post_form(&state, &viewer, None, &PostForm::default(), FormErrors::default()).await
}

async fn post_create(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    multipart: Multipart,
) -> Result<Response, HttpError> {
    let form = read_submitted_form(multipart).await?;
    match state.posts.create(&viewer, &form).await {
        Ok(_) => Ok(Redirect::to(&profile_location(&viewer.username)).into_response()),
        Err(PostError::Invalid(errors)) => {
            render_post_form(&state, &viewer, None, &form, errors).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn post_edit_form(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<String>,
) -> Result<Response, HttpError> {
    let id = parse_post_id(&id)?;
    let post = state.posts.editable(&viewer, id).await?;
    let form = PostForm {
        text: post.text.clone(),
        group: post
            .group
            .as_ref()
            .map(|group| group.id.to_string())
            .unwrap_or_default(),
        image: None,
    };
    render_post_form(&state, &viewer, Some(&post), &form, FormErrors::default()).await
}

async fn post_edit(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, HttpError> {
    let id = parse_post_id(&id)?;
    let form = read_submitted_form(multipart).await?;
    match state.posts.edit(&viewer, id, &form).await {
        Ok(post) => Ok(Redirect::to(&post_location(post.id)).into_response()),
        Err(PostError::Invalid(errors)) => {
            let post = state.posts.editable(&viewer, id).await?;
            render_post_form(&state, &viewer, Some(&post), &form, errors).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn read_submitted_form(multipart: Multipart) -> Result<PostForm, HttpError> {
    read_post_form(multipart).await.map_err(|detail| {
        HttpError::new(
            "infra::http::public::read_submitted_form",
            StatusCode::BAD_REQUEST,
            "Request could not be processed",
            detail,
        )
    })
}

/// Render the create or edit form. Re-rendered forms carry their errors and
/// answer with 400.
async fn render_post_form(
    state: &HttpState,
    viewer: &Viewer,
    editing: Option<&PostRecord>,
    form: &PostForm,
    errors: FormErrors,
) -> Result<Response, HttpError> {
    let groups = state.posts.group_choices().await?;
    let action = match editing {
        Some(post) => format!("/posts/{}/edit/", post.id),
        None => "/create/".to_string(),
    };
    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    let content = PostFormView::new(
        action,
        editing.is_some(),
        form.text.clone(),
        &form.group,
        &groups,
    )
    .with_current_image(editing.and_then(|post| post.image.as_deref()))
    .with_errors(errors);
    let view = LayoutContext::new(state.chrome.load(Some(viewer)), content);
    Ok(render_template_response(PostFormTemplate { view }, status))
}

async fn about_author(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
) -> Response {
    let view = LayoutContext::new(state.chrome.load(viewer.as_ref()), ());
    render_template_response(AboutAuthorTemplate { view }, StatusCode::OK)
}

async fn about_tech(
    State(state): State<HttpState>,
    CurrentViewer(viewer): CurrentViewer,
) -> Response {
    let view = LayoutContext::new(state.chrome.load(viewer.as_ref()), ());
    render_template_response(AboutTechTemplate { view }, StatusCode::OK)
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.blobs.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(BlobStoreError::InvalidPath | BlobStoreError::NotFound) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Page not found",
            "The requested media file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = "yatube::http::media",
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &err,
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn not_found() -> HttpError {
    HttpError::new(
        "infra::http::public::not_found",
        StatusCode::NOT_FOUND,
        "Page not found",
        "no route matched the request path",
    )
}
