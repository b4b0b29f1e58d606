//! Byte-range file delivery through `/stream`, `/file` and `/thumbnail`.

use axum::body::Body;
use axum::http::Request;

use crate::support::{HarnessBuilder, payload};

fn ranged(uri: &str, range: &str) -> Request<Body> {
    Request::get(uri)
        .header("range", range)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_full_file_without_range() {
    let harness = HarnessBuilder::new().file("clip.mp4", payload(1000)).build();

    let response = harness.get(&harness.media_uri("/stream", "clip.mp4")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-length"), Some("1000"));
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(response.header("content-type"), Some("video/mp4"));
    assert_eq!(response.body, payload(1000));
}

#[tokio::test]
async fn test_blank_range_header_sends_whole_file() {
    let harness = HarnessBuilder::new().file("clip.mp4", payload(1000)).build();
    let uri = harness.media_uri("/stream", "clip.mp4");

    let response = harness.send(ranged(&uri, "")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-range"), None);
    assert_eq!(response.body, payload(1000));
}

#[tokio::test]
async fn test_open_ended_range() {
    let harness = HarnessBuilder::new().file("clip.mp4", payload(1000)).build();
    let uri = harness.media_uri("/stream", "clip.mp4");

    let response = harness.send(ranged(&uri, "bytes=500-")).await;

    assert_eq!(response.status, 206);
    assert_eq!(response.header("content-range"), Some("bytes 500-999/1000"));
    assert_eq!(response.header("content-length"), Some("500"));
    assert_eq!(response.body, payload(1000)[500..].to_vec());
}

#[tokio::test]
async fn test_first_byte_only() {
    let harness = HarnessBuilder::new().file("clip.mp4", payload(1000)).build();
    let uri = harness.media_uri("/stream", "clip.mp4");

    let response = harness.send(ranged(&uri, "bytes=0-0")).await;

    assert_eq!(response.status, 206);
    assert_eq!(response.body.len(), 1);
}

#[tokio::test]
async fn test_unsatisfiable_range_is_416_with_empty_body() {
    let harness = HarnessBuilder::new().file("clip.mp4", payload(1000)).build();
    let uri = harness.media_uri("/stream", "clip.mp4");

    let response = harness.send(ranged(&uri, "bytes=2000-3000")).await;

    assert_eq!(response.status, 416);
    assert_eq!(response.header("content-range"), Some("bytes */1000"));
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_malformed_ranges_are_416() {
    let harness = HarnessBuilder::new().file("clip.mp4", payload(100)).build();
    let uri = harness.media_uri("/stream", "clip.mp4");

    for range in ["bytes=-10", "bytes=0-1,4-5", "pages=1-2"] {
        let response = harness.send(ranged(&uri, range)).await;
        assert_eq!(response.status, 416, "{range}");
    }
}

#[tokio::test]
async fn test_unencoded_path_also_resolves() {
    let harness = HarnessBuilder::new().file("notes.txt", "hello").build();
    let path = harness.path("notes.txt");

    let response = harness
        .get(&format!("/stream{}", path.to_string_lossy()))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"hello");
}

#[tokio::test]
async fn test_missing_file_is_404() {
    let harness = HarnessBuilder::new().build();

    let response = harness.get(&harness.media_uri("/stream", "gone.mp4")).await;

    assert_eq!(response.status, 404);
    assert!(response.json()["error"].is_string());
}

#[tokio::test]
async fn test_parent_components_are_rejected() {
    let harness = HarnessBuilder::new().build();

    let response = harness.get("/stream/%2Fsrv%2F..%2Fetc%2Fpasswd").await;

    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_file_download_sets_disposition() {
    let harness = HarnessBuilder::new().file("report.pdf", "pdf").build();
    let uri = format!("{}?download=1", harness.media_uri("/file", "report.pdf"));

    let response = harness.get(&uri).await;

    assert_eq!(response.status, 200);
    assert_eq!(
        response.header("content-type"),
        Some("application/octet-stream")
    );
    assert!(
        response
            .header("content-disposition")
            .unwrap()
            .starts_with("attachment; filename=\"report.pdf\"")
    );
}

#[tokio::test]
async fn test_file_inline_without_query() {
    let harness = HarnessBuilder::new().file("report.pdf", "pdf").build();

    let response = harness.get(&harness.media_uri("/file", "report.pdf")).await;

    assert_eq!(response.header("content-type"), Some("application/pdf"));
    assert!(response.header("content-disposition").is_none());
}

#[tokio::test]
async fn test_thumbnail_serves_images_only() {
    let harness = HarnessBuilder::new()
        .file("photo.png", payload(64))
        .file("clip.mp4", payload(64))
        .build();

    let image = harness.get(&harness.media_uri("/thumbnail", "photo.png")).await;
    let video = harness.get(&harness.media_uri("/thumbnail", "clip.mp4")).await;

    assert_eq!(image.status, 200);
    assert_eq!(image.header("content-type"), Some("image/png"));
    assert_eq!(image.body, payload(64));
    assert_eq!(video.status, 400);
}
