//! Paginated search through the HTTP surface.

use crate::support::HarnessBuilder;

#[tokio::test]
async fn test_seeded_cache_serves_second_page() {
    let harness = HarnessBuilder::new()
        .file("a", "1")
        .file("b", "22")
        .file("c", "333")
        .file("d", "4444")
        .file("e", "55555")
        .build();
    let seeded: Vec<String> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|n| harness.path(n).to_string_lossy().into_owned())
        .collect();
    harness.cache.put("video", seeded);

    let response = harness.get("/api/search?q=video&page=2&pageSize=2").await;

    assert_eq!(response.status, 200);
    let json = response.json();
    let names: Vec<&str> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["c", "d"]);
    assert_eq!(json["count"], 2);
    assert_eq!(json["totalCount"], 5);
    assert_eq!(json["totalPages"], 3);
    assert_eq!(json["page"], 2);
    assert_eq!(json["pageSize"], 2);
    assert_eq!(json["query"], "video");
    assert_eq!(json["fromCache"], true);
    assert_eq!(json["results"][0]["size"], 3);
    assert_eq!(json["results"][0]["type"], "file");
    assert_eq!(harness.locator.calls(), 0);
}

#[tokio::test]
async fn test_miss_then_hit() {
    let harness = HarnessBuilder::new()
        .file("holiday.mkv", "video")
        .file("holiday.jpg", "image")
        .located(&["holiday.mkv", "holiday.jpg"])
        .build();

    let first = harness.get("/api/search?q=holiday").await.json();
    let second = harness.get("/api/search?q=holiday").await.json();

    assert_eq!(first["fromCache"], false);
    assert_eq!(second["fromCache"], true);
    assert_eq!(harness.locator.calls(), 1);
    assert_eq!(first["results"], second["results"]);
    assert_eq!(first["results"][0]["type"], "video");
    assert_eq!(first["results"][1]["type"], "image");
    assert_eq!(first["pageSize"], 50);
}

#[tokio::test]
async fn test_bad_page_values_are_clamped() {
    let harness = HarnessBuilder::new()
        .file("one.txt", "1")
        .located(&["one.txt"])
        .build();

    let json = harness
        .get("/api/search?q=one&page=-4&pageSize=100000")
        .await
        .json();

    assert_eq!(json["page"], 1);
    assert_eq!(json["pageSize"], 50);
    assert_eq!(json["count"], 1);
}

#[tokio::test]
async fn test_vanished_files_are_skipped_but_counted() {
    let harness = HarnessBuilder::new()
        .file("kept.txt", "k")
        .located(&["kept.txt", "deleted.txt"])
        .build();

    let json = harness.get("/api/search?q=anything").await.json();

    assert_eq!(json["count"], 1);
    assert_eq!(json["totalCount"], 2);
    assert_eq!(json["totalPages"], 1);
}

#[tokio::test]
async fn test_no_matches() {
    let harness = HarnessBuilder::new().build();

    let json = harness.get("/api/search?q=nothing").await.json();

    assert_eq!(json["totalCount"], 0);
    assert_eq!(json["totalPages"], 0);
    assert_eq!(json["results"], serde_json::json!([]));
}

#[tokio::test]
async fn test_missing_or_empty_query_is_bad_request() {
    let harness = HarnessBuilder::new().build();

    let missing = harness.get("/api/search?page=1").await;
    let empty = harness.get("/api/search?q=").await;

    assert_eq!(missing.status, 400);
    assert_eq!(empty.status, 400);
    assert!(missing.json()["error"].is_string());
    assert_eq!(harness.locator.calls(), 0);
}

#[tokio::test]
async fn test_locator_failure_is_bad_gateway() {
    let harness = HarnessBuilder::new().locator_fails().build();

    let response = harness.get("/api/search?q=anything").await;

    assert_eq!(response.status, 502);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn test_legacy_search_returns_everything() {
    let harness = HarnessBuilder::new()
        .file("a.txt", "a")
        .file("b.txt", "b")
        .located(&["a.txt", "b.txt"])
        .build();

    let json = harness.get("/search?search=txt").await.json();

    assert_eq!(json["count"], 2);
    assert_eq!(json["query"], "txt");
}

#[tokio::test]
async fn test_legacy_search_without_query_redirects_home() {
    let harness = HarnessBuilder::new().build();

    let response = harness.get("/search").await;

    assert_eq!(response.status, 303);
    assert_eq!(response.header("location"), Some("/"));
}
