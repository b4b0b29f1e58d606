//! Live transcoding through `/transcode`.

use crate::support::{HarnessBuilder, payload};

#[tokio::test]
async fn test_unavailable_transcoder_is_503_without_spawning() {
    let harness = HarnessBuilder::new().file("clip.avi", payload(10)).build();

    let response = harness.get(&harness.media_uri("/transcode", "clip.avi")).await;

    assert_eq!(response.status, 503);
    assert_eq!(harness.transcoder.spawns(), 0);
}

#[tokio::test]
async fn test_transcoder_status_endpoint() {
    let harness = HarnessBuilder::new().build();

    let json = harness.get("/api/transcoder").await.json();

    assert_eq!(json["available"], false);
    assert_eq!(json["maxConcurrent"], 2);
    assert_eq!(json["inFlight"], 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_streams_transcoder_output() {
    let harness = HarnessBuilder::new()
        .file("clip.avi", payload(5000))
        .transcoder("cat \"$1\"; echo 'frame=1 Error while decoding' >&2")
        .build();

    let response = harness.get(&harness.media_uri("/transcode", "clip.avi")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("video/mp4"));
    assert!(response.header("accept-ranges").is_none());
    assert!(response.header("content-length").is_none());
    assert_eq!(response.body, payload(5000));
    assert_eq!(harness.transcoder.spawns(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_missing_source_is_404_without_spawning() {
    let harness = HarnessBuilder::new().transcoder("cat \"$1\"").build();

    let response = harness.get(&harness.media_uri("/transcode", "gone.avi")).await;

    assert_eq!(response.status, 404);
    assert_eq!(harness.transcoder.spawns(), 0);
}
