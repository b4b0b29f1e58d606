//! Cache introspection and clearing.

use crate::support::HarnessBuilder;

#[tokio::test]
async fn test_status_lists_entries_sorted_by_query() {
    let harness = HarnessBuilder::new().build();
    harness.cache.put("zebra", vec!["/z1".to_string(), "/z2".to_string()]);
    harness.cache.put("apple", vec!["/a1".to_string()]);

    let json = harness.get("/api/cache-status").await.json();

    assert_eq!(json["entryCount"], 2);
    assert_eq!(json["ttlSeconds"], 600);
    assert_eq!(json["entries"][0]["query"], "apple");
    assert_eq!(json["entries"][0]["pathCount"], 1);
    assert_eq!(json["entries"][1]["query"], "zebra");
    assert_eq!(json["entries"][1]["pathCount"], 2);
    assert!(json["entries"][0]["capturedAt"].is_string());
    assert!(json["entries"][0]["ageSeconds"].is_u64());
}

#[tokio::test]
async fn test_search_populates_status() {
    let harness = HarnessBuilder::new().located(&["missing.txt"]).build();

    harness.get("/api/search?q=report").await;
    let json = harness.get("/api/cache-status").await.json();

    assert_eq!(json["entryCount"], 1);
    assert_eq!(json["entries"][0]["query"], "report");
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let harness = HarnessBuilder::new().build();
    harness.cache.put("a", Vec::new());
    harness.cache.put("b", Vec::new());

    let first = harness.post("/api/cache-clear").await.json();
    let second = harness.post("/api/cache-clear").await.json();

    assert_eq!(first["success"], true);
    assert_eq!(first["clearedCount"], 2);
    assert_eq!(second["clearedCount"], 0);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn test_clear_forces_fresh_lookup() {
    let harness = HarnessBuilder::new().located(&["x.txt"]).build();

    harness.get("/api/search?q=x").await;
    harness.post("/api/cache-clear").await;
    let json = harness.get("/api/search?q=x").await.json();

    assert_eq!(json["fromCache"], false);
    assert_eq!(harness.locator.calls(), 2);
}
