use crate::application::error::{ErrorPageKind, ErrorReport, HttpError};
use crate::application::feed::{GroupFeed, PostDetail, ProfileFeed};
use crate::application::pagination::{Page, PageWindow};
use crate::application::posts::FormErrors;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use crate::domain::posts::POST_DATE_FORMAT;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render an error page inside the site layout, keeping the failing layer's report.
pub fn render_error_response(
    chrome: LayoutChrome,
    status: StatusCode,
    content: ErrorPageView,
    report: Option<ErrorReport>,
) -> Response {
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, status);
    if let Some(report) = report {
        report.attach(&mut response);
    }
    response
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value.format(POST_DATE_FORMAT).unwrap_or_default()
}

pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub viewer: Option<ViewerView>,
    pub year: i32,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub viewer: Option<ViewerView>,
    pub year: i32,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            viewer: chrome.viewer,
            year: chrome.year,
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupLink {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub published: String,
    pub author_username: String,
    pub author_href: String,
    pub group: Option<GroupLink>,
    pub image_url: Option<String>,
    pub detail_href: String,
}

impl PostCard {
    pub fn from_record(post: &PostRecord) -> Self {
        Self {
            id: post.id.0,
            text: post.text.clone(),
            published: format_timestamp(post.pub_date),
            author_username: post.author.username.clone(),
            author_href: format!("/profile/{}/", post.author.username),
            group: post.group.as_ref().map(|group| GroupLink {
                title: group.title.clone(),
                href: format!("/group/{}/", group.slug),
            }),
            image_url: post.image.as_deref().map(media_url),
            detail_href: format!("/posts/{}/", post.id),
        }
    }
}

#[derive(Clone)]
pub struct PageLinkView {
    pub number: u64,
    pub href: String,
    pub is_current: bool,
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u64,
    pub num_pages: u64,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub pages: Vec<PageLinkView>,
}

impl PaginatorView {
    pub fn new(window: &PageWindow) -> Self {
        let href = |number: u64| format!("?page={number}");
        Self {
            number: window.number,
            num_pages: window.num_pages,
            previous_href: window
                .has_previous()
                .then(|| href(window.previous_page_number())),
            next_href: window.has_next().then(|| href(window.next_page_number())),
            pages: (1..=window.num_pages)
                .map(|number| PageLinkView {
                    number,
                    href: href(number),
                    is_current: number == window.number,
                })
                .collect(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.num_pages > 1
    }
}

/// A paginated list of post cards.
pub struct FeedView {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl FeedView {
    pub fn from_page(page: &Page<PostRecord>) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from_record).collect(),
            paginator: PaginatorView::new(&page.window),
        }
    }
}

pub struct IndexView {
    pub heading: &'static str,
    pub active_tab: &'static str,
    pub feed: FeedView,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

pub struct GroupView {
    pub title: String,
    pub description: String,
    pub feed: FeedView,
}

impl GroupView {
    pub fn from_feed(feed: &GroupFeed) -> Self {
        Self {
            title: feed.group.title.clone(),
            description: feed.group.description.clone(),
            feed: FeedView::from_page(&feed.page),
        }
    }
}

#[derive(Template)]
#[template(path = "group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupView>,
}

pub struct ProfileView {
    pub username: String,
    pub display_name: String,
    pub post_count: u64,
    pub is_following: bool,
    /// Follow controls are offered to signed-in viewers looking at someone else.
    pub can_follow: bool,
    pub follow_href: String,
    pub unfollow_href: String,
    pub feed: FeedView,
}

impl ProfileView {
    pub fn from_feed(profile: &ProfileFeed, viewer_username: Option<&str>) -> Self {
        let username = profile.author.username.clone();
        Self {
            display_name: profile.author.display_name(),
            post_count: profile.post_count,
            is_following: profile.is_following,
            can_follow: viewer_username.is_some_and(|viewer| viewer != username),
            follow_href: format!("/profile/{username}/follow/"),
            unfollow_href: format!("/profile/{username}/unfollow/"),
            feed: FeedView::from_page(&profile.page),
            username,
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

pub struct CommentView {
    pub author_username: String,
    pub author_href: String,
    pub text: String,
    pub created: String,
}

impl CommentView {
    pub fn from_record(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author.username.clone(),
            author_href: format!("/profile/{}/", comment.author.username),
            text: comment.text.clone(),
            created: format_timestamp(comment.created),
        }
    }
}

#[derive(Default)]
pub struct CommentFormView {
    pub text: String,
    pub errors: Vec<String>,
}

pub struct PostDetailView {
    pub post: PostCard,
    pub title: String,
    pub author_post_count: u64,
    pub can_edit: bool,
    pub edit_href: String,
    pub comment_action: String,
    pub comments: Vec<CommentView>,
    pub comment_form: CommentFormView,
    pub show_comment_form: bool,
}

impl PostDetailView {
    pub fn from_detail(
        detail: &PostDetail,
        viewer_username: Option<&str>,
        comment_form: CommentFormView,
    ) -> Self {
        let post = &detail.post;
        Self {
            post: PostCard::from_record(post),
            title: post.to_string(),
            author_post_count: detail.author_post_count,
            can_edit: viewer_username.is_some_and(|viewer| viewer == post.author.username),
            edit_href: format!("/posts/{}/edit/", post.id),
            comment_action: format!("/posts/{}/comment/", post.id),
            comments: detail.comments.iter().map(CommentView::from_record).collect(),
            comment_form,
            show_comment_form: viewer_username.is_some(),
        }
    }
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub errors: FormErrors,
}

impl PostFormView {
    pub fn new(
        action: String,
        is_edit: bool,
        text: String,
        selected_group: &str,
        groups: &[GroupRecord],
    ) -> Self {
        let selected_group = selected_group.trim();
        Self {
            is_edit,
            action,
            text,
            groups: groups
                .iter()
                .map(|group| GroupOption {
                    id: group.id.0,
                    title: group.title.clone(),
                    selected: group.id.0.to_string() == selected_group,
                })
                .collect(),
            current_image: None,
            errors: FormErrors::default(),
        }
    }

    pub fn with_errors(self, errors: FormErrors) -> Self {
        Self { errors, ..self }
    }

    pub fn with_current_image(self, stored_path: Option<&str>) -> Self {
        Self {
            current_image: stored_path.map(media_url),
            ..self
        }
    }

    pub fn has_group_selected(&self) -> bool {
        self.groups.iter().any(|group| group.selected)
    }
}

#[derive(Template)]
#[template(path = "create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

pub struct ErrorPageView {
    pub heading: &'static str,
    pub message: String,
    pub path: Option<String>,
}

impl ErrorPageView {
    pub fn for_kind(kind: ErrorPageKind, message: &str, path: &str) -> Self {
        match kind {
            ErrorPageKind::NotFound => Self {
                heading: "Page not found",
                message: "The page you requested does not exist.".to_string(),
                path: Some(path.to_string()),
            },
            ErrorPageKind::Forbidden => Self {
                heading: "Access denied",
                message: message.to_string(),
                path: None,
            },
            ErrorPageKind::CsrfFailure => Self {
                heading: "Request rejected",
                message: "The form was submitted from another site, so it was not processed."
                    .to_string(),
                path: None,
            },
            ErrorPageKind::BadRequest => Self {
                heading: "Bad request",
                message: message.to_string(),
                path: None,
            },
            ErrorPageKind::Unavailable | ErrorPageKind::Internal => Self {
                heading: "Server error",
                message: "Something went wrong on our side. Please try again later.".to_string(),
                path: None,
            },
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub view: LayoutContext<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{AuthorRef, GroupRef};
    use crate::domain::types::{GroupId, PostId, UserId};
    use time::macros::datetime;

    fn sample_post() -> PostRecord {
        PostRecord {
            id: PostId(42),
            text: "A day in the life of a blogger".to_string(),
            pub_date: datetime!(2023-01-02 10:30 UTC),
            author: AuthorRef {
                id: UserId(7),
                username: "anna".to_string(),
            },
            group: Some(GroupRef {
                id: GroupId(3),
                slug: "diaries".to_string(),
                title: "Diaries".to_string(),
            }),
            image: Some("posts/cat.png".to_string()),
        }
    }

    #[test]
    fn post_card_links_author_group_and_media() {
        let card = PostCard::from_record(&sample_post());
        assert_eq!(card.author_href, "/profile/anna/");
        assert_eq!(card.detail_href, "/posts/42/");
        assert_eq!(card.group.unwrap().href, "/group/diaries/");
        assert_eq!(card.image_url.as_deref(), Some("/media/posts/cat.png"));
        assert_eq!(card.published, "02 Jan 2023, 10:30");
    }

    #[test]
    fn paginator_links_neighbours() {
        let view = PaginatorView::new(&PageWindow::resolve(25, 10, Some("2")));
        assert_eq!(view.previous_href.as_deref(), Some("?page=1"));
        assert_eq!(view.next_href.as_deref(), Some("?page=3"));
        assert_eq!(view.pages.len(), 3);
        assert!(view.pages[1].is_current);
        assert!(view.is_visible());
    }

    #[test]
    fn form_marks_selected_group() {
        let groups = vec![GroupRecord {
            id: GroupId(3),
            title: "Diaries".to_string(),
            slug: "diaries".to_string(),
            description: String::new(),
        }];
        let view = PostFormView::new("/create/".into(), false, String::new(), "3", &groups);
        assert!(view.has_group_selected());
        let view = PostFormView::new("/create/".into(), false, String::new(), "", &groups);
        assert!(!view.has_group_selected());
    }

    #[test]
    fn not_found_page_echoes_path() {
        let page = ErrorPageView::for_kind(ErrorPageKind::NotFound, "Page not found", "/nope/");
        assert_eq!(page.path.as_deref(), Some("/nope/"));
    }
}
