mod support;

use std::collections::HashSet;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use metrics_util::debugging::DebuggingRecorder;

use support::{app, get, send};

#[tokio::test]
async fn page_cache_emits_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = app();
    let leo = app.store.add_user("leo");
    app.store.add_post(&leo, "Counted post", None);

    for uri in ["/", "/", "/?page=2"] {
        let response = send(&app.public, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

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

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "yatube_page_cache_hit_total",
        "yatube_page_cache_miss_total",
        "yatube_page_cache_store_total",
        "yatube_page_cache_clear_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
