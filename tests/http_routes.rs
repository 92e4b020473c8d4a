mod support;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use support::{
    HOST, TINY_GIF, TestOptions, USER_HEADER, app, app_with, body_text, card_count, get,
    location, multipart_body, post_form, post_multipart, send,
};

#[tokio::test]
async fn listings_split_thirteen_posts_into_ten_and_three() {
    let app = app();
    let leo = app.store.add_user("leo");
    let reader = app.store.add_user("reader");
    let cats = app.store.add_group("Cats", "cats");
    for n in 0..13 {
        app.store.add_post(&leo, &format!("Cat post number {n}"), Some(&cats));
    }
    app.store.follow_edge(reader.id, leo.id);

    let cases = [
        ("/", None),
        ("/group/cats/", None),
        ("/profile/leo/", None),
        ("/follow/", Some("reader")),
    ];
    for (path, viewer) in cases {
        let first = send(&app.public, get(path, viewer)).await;
        assert_eq!(first.status(), StatusCode::OK, "{path}");
        assert_eq!(card_count(&body_text(first).await), 10, "{path} page 1");

        let second = send(&app.public, get(&format!("{path}?page=2"), viewer)).await;
        assert_eq!(second.status(), StatusCode::OK, "{path}");
        assert_eq!(card_count(&body_text(second).await), 3, "{path} page 2");
    }
}

#[tokio::test]
async fn out_of_range_and_garbage_pages_are_clamped() {
    let app = app();
    let leo = app.store.add_user("leo");
    let cats = app.store.add_group("Cats", "cats");
    for n in 0..13 {
        app.store.add_post(&leo, &format!("Cat post number {n}"), Some(&cats));
    }

    let last = send(&app.public, get("/group/cats/?page=99", None)).await;
    assert_eq!(card_count(&body_text(last).await), 3);

    let garbage = send(&app.public, get("/group/cats/?page=abc", None)).await;
    assert_eq!(card_count(&body_text(garbage).await), 10);

    let negative = send(&app.public, get("/group/cats/?page=-4", None)).await;
    assert_eq!(card_count(&body_text(negative).await), 10);

    let huge = send(&app.public, get("/group/cats/?page=99999999999999999999", None)).await;
    assert_eq!(huge.status(), StatusCode::OK);
    assert_eq!(card_count(&body_text(huge).await), 3);
}

#[tokio::test]
async fn repeated_page_parameter_uses_the_last_value() {
    let app = app();
    let leo = app.store.add_user("leo");
    let cats = app.store.add_group("Cats", "cats");
    for n in 0..13 {
        app.store.add_post(&leo, &format!("Cat post number {n}"), Some(&cats));
    }

    for path in ["/", "/group/cats/", "/profile/leo/"] {
        let response = send(&app.public, get(&format!("{path}?page=1&page=2"), None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        assert_eq!(card_count(&body_text(response).await), 3, "{path}");
    }

    // The cached home page for `page=2` must not be served for `page=2&page=1`.
    let flipped = send(&app.public, get("/?page=2&page=1", None)).await;
    assert_eq!(card_count(&body_text(flipped).await), 10);
}

#[tokio::test]
async fn listings_are_newest_first() {
    let app = app();
    let leo = app.store.add_user("leo");
    app.store.add_post(&leo, "Older entry", None);
    app.store.add_post(&leo, "Newer entry", None);

    let html = body_text(send(&app.public, get("/profile/leo/", None)).await).await;
    let newer = html.find("Newer entry").expect("newer post rendered");
    let older = html.find("Older entry").expect("older post rendered");
    assert!(newer < older);
}

#[tokio::test]
async fn empty_feeds_render_a_single_empty_page() {
    let app = app();
    app.store.add_user("reader");

    let response = send(&app.public, get("/follow/", Some("reader"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert_eq!(card_count(&html), 0);
    assert!(html.contains("No posts yet."));
}

#[tokio::test]
async fn follow_then_unfollow_restores_edge_count() {
    let app = app();
    app.store.add_user("leo");
    app.store.add_user("reader");
    let before = app.store.follow_count();

    let response = send(
        &app.public,
        post_form("/profile/leo/follow/", Some("reader"), ""),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/profile/leo/"));
    assert_eq!(app.store.follow_count(), before + 1);

    // Following again is idempotent.
    send(&app.public, get("/profile/leo/follow/", Some("reader"))).await;
    assert_eq!(app.store.follow_count(), before + 1);

    let response = send(&app.public, get("/profile/leo/unfollow/", Some("reader"))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.follow_count(), before);
}

#[tokio::test]
async fn following_yourself_changes_nothing() {
    let app = app();
    app.store.add_user("leo");

    let response = send(&app.public, get("/profile/leo/follow/", Some("leo"))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/profile/leo/"));
    assert_eq!(app.store.follow_count(), 0);
}

#[tokio::test]
async fn unfollowing_without_an_edge_is_silent() {
    let app = app();
    app.store.add_user("leo");
    app.store.add_user("reader");

    let response = send(&app.public, get("/profile/leo/unfollow/", Some("reader"))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.follow_count(), 0);
}

#[tokio::test]
async fn following_an_unknown_author_is_not_found() {
    let app = app();
    app.store.add_user("reader");

    let response = send(&app.public, get("/profile/ghost/follow/", Some("reader"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_reflects_follow_state() {
    let app = app();
    let leo = app.store.add_user("leo");
    let reader = app.store.add_user("reader");

    let html = body_text(send(&app.public, get("/profile/leo/", Some("reader"))).await).await;
    assert!(html.contains("/profile/leo/follow/"));

    app.store.follow_edge(reader.id, leo.id);
    let html = body_text(send(&app.public, get("/profile/leo/", Some("reader"))).await).await;
    assert!(html.contains("/profile/leo/unfollow/"));

    let own = body_text(send(&app.public, get("/profile/leo/", Some("leo"))).await).await;
    assert!(!own.contains("/profile/leo/follow/"));
    assert!(!own.contains("/profile/leo/unfollow/"));
}

#[tokio::test]
async fn profile_counts_posts_across_groups() {
    let app = app();
    let leo = app.store.add_user("leo");
    let cats = app.store.add_group("Cats", "cats");
    app.store.add_post(&leo, "Post inside a group", Some(&cats));
    app.store.add_post(&leo, "Post without a group", None);

    let html = body_text(send(&app.public, get("/profile/leo/", None)).await).await;
    assert!(html.contains("Posts: 2"));
    assert!(html.contains("Post inside a group"));
    assert!(html.contains("Post without a group"));
}

#[tokio::test]
async fn home_page_stays_stale_until_cache_is_cleared() {
    let app = app();
    let leo = app.store.add_user("leo");
    let post = app.store.add_post(&leo, "Original text", None);

    let first = body_text(send(&app.public, get("/", None)).await).await;
    assert!(first.contains("Original text"));

    let edit = send(
        &app.public,
        post_multipart(
            &format!("/posts/{}/edit/", post.id),
            Some("leo"),
            multipart_body(&[("text", "Edited text"), ("group", "")], None),
        ),
    )
    .await;
    assert_eq!(edit.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&edit), Some("/posts/1/"));

    let second = body_text(send(&app.public, get("/", None)).await).await;
    assert_eq!(first, second);

    let cleared = send(
        &app.admin,
        Request::builder()
            .method(Method::POST)
            .uri("/cache/clear")
            .body(Body::empty())
            .expect("request should build"),
    )
    .await;
    assert_eq!(cleared.status(), StatusCode::NO_CONTENT);

    let third = body_text(send(&app.public, get("/", None)).await).await;
    assert!(third.contains("Edited text"));
    assert!(!third.contains("Original text"));
}

#[tokio::test]
async fn other_listings_are_not_cached() {
    let app = app();
    let leo = app.store.add_user("leo");
    let post = app.store.add_post(&leo, "Original text", None);

    let first = body_text(send(&app.public, get("/profile/leo/", None)).await).await;
    assert!(first.contains("Original text"));

    app.store.set_post_text(post.id, "Changed text");
    let second = body_text(send(&app.public, get("/profile/leo/", None)).await).await;
    assert!(second.contains("Changed text"));
}

#[tokio::test]
async fn unknown_paths_render_not_found_page_with_path() {
    let app = app();

    let response = send(&app.public, get("/no/such/page/", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_text(response).await;
    assert!(html.contains("Page not found"));
    assert!(html.contains("/no/such/page/"));
}

#[tokio::test]
async fn unknown_entities_are_not_found() {
    let app = app();
    app.store.add_user("leo");

    for path in ["/group/nothing/", "/profile/ghost/", "/posts/404/", "/posts/abc/"] {
        let response = send(&app.public, get(path, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn anonymous_visitors_are_refused_without_login_page() {
    let app = app();

    for path in ["/create/", "/follow/", "/profile/leo/follow/"] {
        let response = send(&app.public, get(path, None)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
    }
}

#[tokio::test]
async fn anonymous_visitors_are_sent_to_login_page() {
    let app = app_with(TestOptions {
        login_url: Some("/auth/login/".to_string()),
        ..TestOptions::default()
    });

    let response = send(&app.public, get("/create/", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/auth/login/?next=%2Fcreate%2F"));
}

#[tokio::test]
async fn unknown_identities_are_provisioned_on_first_sight() {
    let app = app();

    let response = send(&app.public, get("/create/", Some("newcomer"))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let profile = send(&app.public, get("/profile/newcomer/", None)).await;
    assert_eq!(profile.status(), StatusCode::OK);
}

#[tokio::test]
async fn creating_a_post_redirects_to_profile_and_stores_image() {
    let app = app();
    app.store.add_user("leo");
    let cats = app.store.add_group("Cats", "cats");

    let group_id = cats.id.to_string();
    let response = send(
        &app.public,
        post_multipart(
            "/create/",
            Some("leo"),
            multipart_body(
                &[("text", "Fresh post with a picture"), ("group", &group_id)],
                Some(("pixel.gif", TINY_GIF)),
            ),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/profile/leo/"));

    let post = app.store.latest_post().expect("post stored");
    assert_eq!(post.text, "Fresh post with a picture");
    assert_eq!(post.group.map(|group| group.slug).as_deref(), Some("cats"));
    let image = post.image.expect("image stored");
    assert!(image.starts_with("posts/"));

    let media = send(&app.public, get(&format!("/media/{image}"), None)).await;
    assert_eq!(media.status(), StatusCode::OK);
    assert_eq!(
        media
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("image/gif")
    );

    let group_page = body_text(send(&app.public, get("/group/cats/", None)).await).await;
    assert!(group_page.contains("Fresh post with a picture"));
}

#[tokio::test]
async fn invalid_post_forms_are_rerendered_with_errors() {
    let app = app();
    app.store.add_user("leo");

    let response = send(
        &app.public,
        post_multipart(
            "/create/",
            Some("leo"),
            multipart_body(&[("text", "   "), ("group", "")], None),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("This field is required."));

    let response = send(
        &app.public,
        post_multipart(
            "/create/",
            Some("leo"),
            multipart_body(&[("text", "Some text"), ("group", "999")], None),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Select a valid choice"));

    let response = send(
        &app.public,
        post_multipart(
            "/create/",
            Some("leo"),
            multipart_body(&[("text", "Some text")], Some(("notes.txt", &b"plain text"[..]))),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Upload a valid image"));

    assert_eq!(app.store.post_count(), 0);
}

#[tokio::test]
async fn failed_post_writes_leave_no_stored_images() {
    let app = app();
    let leo = app.store.add_user("leo");
    let post = app.store.add_post(&leo, "Leo wrote this", None);
    app.store.fail_post_writes();

    let response = send(
        &app.public,
        post_multipart(
            &format!("/posts/{}/edit/", post.id),
            Some("leo"),
            multipart_body(&[("text", "Edited text")], Some(("pixel.gif", TINY_GIF))),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = send(
        &app.public,
        post_multipart(
            "/create/",
            Some("leo"),
            multipart_body(&[("text", "New text")], Some(("pixel.gif", TINY_GIF))),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert!(app.store.blob_paths().is_empty());
    assert_eq!(app.store.post(post.id).expect("post kept").text, "Leo wrote this");
}

#[tokio::test]
async fn only_the_author_may_edit() {
    let app = app();
    let leo = app.store.add_user("leo");
    app.store.add_user("mallory");
    let post = app.store.add_post(&leo, "Leo wrote this", None);
    let edit_path = format!("/posts/{}/edit/", post.id);

    let form = send(&app.public, get(&edit_path, Some("leo"))).await;
    assert_eq!(form.status(), StatusCode::OK);
    let html = body_text(form).await;
    assert!(html.contains("Edit post"));
    assert!(html.contains("Leo wrote this"));

    let response = send(&app.public, get(&edit_path, Some("mallory"))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app.public,
        post_multipart(
            &edit_path,
            Some("mallory"),
            multipart_body(&[("text", "Hijacked")], None),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let stored = app.store.post(post.id).expect("post kept");
    assert_eq!(stored.text, "Leo wrote this");
    assert_eq!(stored.author.username, "leo");
}

#[tokio::test]
async fn comments_are_added_and_listed_on_the_post() {
    let app = app();
    let leo = app.store.add_user("leo");
    app.store.add_user("reader");
    let post = app.store.add_post(&leo, "Discuss this", None);
    let post_path = format!("/posts/{}/", post.id);

    let response = send(
        &app.public,
        post_form(
            &format!("/posts/{}/comment/", post.id),
            Some("reader"),
            "text=Nice+post",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(post_path.as_str()));
    assert_eq!(app.store.comment_count(), 1);

    let html = body_text(send(&app.public, get(&post_path, None)).await).await;
    assert!(html.contains("Nice post"));
    assert!(html.contains("Posts by this author: 1"));

    let response = send(
        &app.public,
        post_form(
            &format!("/posts/{}/comment/", post.id),
            Some("reader"),
            "text=",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.store.comment_count(), 1);
}

#[tokio::test]
async fn cross_origin_submissions_are_rejected() {
    let app = app();
    app.store.add_user("leo");
    app.store.add_user("reader");

    let forged = Request::builder()
        .method(Method::POST)
        .uri("/profile/leo/follow/")
        .header(header::HOST, HOST)
        .header(header::ORIGIN, "https://evil.example")
        .header(USER_HEADER, "reader")
        .body(Body::empty())
        .expect("request should build");
    let response = send(&app.public, forged).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_text(response).await.contains("Request rejected"));
    assert_eq!(app.store.follow_count(), 0);

    let fetch_metadata = Request::builder()
        .method(Method::POST)
        .uri("/profile/leo/follow/")
        .header(header::HOST, HOST)
        .header("sec-fetch-site", "cross-site")
        .header(USER_HEADER, "reader")
        .body(Body::empty())
        .expect("request should build");
    let response = send(&app.public, fetch_metadata).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.store.follow_count(), 0);
}

#[tokio::test]
async fn cross_site_follow_links_are_rejected() {
    let app = app();
    app.store.add_user("leo");
    app.store.add_user("reader");

    let embedded = Request::builder()
        .method(Method::GET)
        .uri("/profile/leo/follow/")
        .header(header::HOST, HOST)
        .header("sec-fetch-site", "cross-site")
        .header(USER_HEADER, "reader")
        .body(Body::empty())
        .expect("request should build");
    let response = send(&app.public, embedded).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.store.follow_count(), 0);

    let referred = Request::builder()
        .method(Method::GET)
        .uri("/profile/leo/follow/")
        .header(header::HOST, HOST)
        .header(header::REFERER, "https://evil.example/page")
        .header(USER_HEADER, "reader")
        .body(Body::empty())
        .expect("request should build");
    let response = send(&app.public, referred).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.store.follow_count(), 0);

    // Plain listings stay reachable from other sites.
    let listing = Request::builder()
        .method(Method::GET)
        .uri("/profile/leo/")
        .header(header::HOST, HOST)
        .header("sec-fetch-site", "cross-site")
        .body(Body::empty())
        .expect("request should build");
    assert_eq!(send(&app.public, listing).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn static_pages_render_inside_the_layout() {
    let app = app();

    for (path, heading) in [
        ("/about/author/", "About the author"),
        ("/about/tech/", "Technologies"),
    ] {
        let response = send(&app.public, get(path, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        let html = body_text(response).await;
        assert!(html.contains(heading));
        assert!(html.contains("Yatube"));
    }
}

#[tokio::test]
async fn admin_health_reports_database_state() {
    let app = app();

    let response = send(
        &app.admin,
        Request::builder()
            .uri("/_health/db")
            .body(Body::empty())
            .expect("request should build"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
