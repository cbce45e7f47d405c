//! HTTP-level read-through tests against a mock backend
//!
//! Exercises the cached client through the real REST transport: cache hits
//! must not reach the wire, exempt endpoints always must, and mutations must
//! force the next read back to the network.

use std::time::Duration;

use reqwest::Method;
use serde_json::json;
use tempfile::TempDir;

use tillsync::cache::ResponseCache;
use tillsync::net::retry::{RetryExecutor, RetryPlan};
use tillsync::{CachedClient, RestTransport};

fn fast_test_plan() -> RetryPlan {
    RetryPlan {
        max_retries: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 1.5,
    }
}

fn test_client(server_url: &str, dir: &TempDir) -> CachedClient<RestTransport> {
    let _ = env_logger::builder().is_test(true).try_init();
    let cache = ResponseCache::open_at(dir.path()).expect("cache should open in temp dir");
    let transport = RestTransport::new(server_url).expect("transport should build");
    CachedClient::new(transport, RetryExecutor::with_plan(fast_test_plan()), false)
        .with_cache(cache)
        .with_seller("seller-1")
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let mut server = mockito::Server::new_async().await;
    let products = server
        .mock("GET", "/api/products")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"products": [{"id": 1, "name": "Atta 10kg"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = test_client(&server.url(), &dir);

    let first = client.get("/api/products").await.unwrap();
    let second = client.get("/api/products").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first["products"][0]["name"], json!("Atta 10kg"));
    products.assert_async().await;
}

#[tokio::test]
async fn exempt_endpoint_always_hits_the_wire() {
    let mut server = mockito::Server::new_async().await;
    let plan = server
        .mock("GET", "/api/sellers/current-plan")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"plan": "pro", "expires": "2026-09-01"}"#)
        .expect(2)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = test_client(&server.url(), &dir);

    let first = client.get("/api/sellers/current-plan").await.unwrap();
    let second = client.get("/api/sellers/current-plan").await.unwrap();

    assert_eq!(first, second);
    plan.assert_async().await;
}

#[tokio::test]
async fn mutation_forces_refetch_of_matching_reads() {
    let mut server = mockito::Server::new_async().await;
    let product_reads = server
        .mock("GET", "/api/products")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"["rice", "dal"]"#)
        .expect(2)
        .create_async()
        .await;
    let customer_reads = server
        .mock("GET", "/api/customers")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"["asha"]"#)
        .expect(1)
        .create_async()
        .await;
    let product_write = server
        .mock("POST", "/api/products")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 77}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = test_client(&server.url(), &dir);

    // Warm both caches.
    client.get("/api/products").await.unwrap();
    client.get("/api/customers").await.unwrap();

    // The mutation invalidates entries under its base path only.
    client
        .post("/api/products", json!({"name": "Jaggery 1kg"}))
        .await
        .unwrap();

    // Products refetch; customers are still served locally.
    client.get("/api/products").await.unwrap();
    client.get("/api/customers").await.unwrap();

    product_reads.assert_async().await;
    customer_reads.assert_async().await;
    product_write.assert_async().await;
}

#[tokio::test]
async fn server_errors_retry_then_surface() {
    let mut server = mockito::Server::new_async().await;
    let dashboard = server
        .mock("GET", "/api/dashboard")
        .with_status(500)
        .with_body("database unavailable")
        .expect(3)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = test_client(&server.url(), &dir);

    // 2 retries configured: 3 total attempts, then the server's error.
    let err = client.get("/api/dashboard").await.unwrap_err();
    assert!(err.to_string().contains("database unavailable"));
    dashboard.assert_async().await;
}

#[tokio::test]
async fn failed_reads_are_not_cached() {
    let mut server = mockito::Server::new_async().await;
    let flaky = server
        .mock("GET", "/api/reports/weekly")
        .with_status(503)
        .with_body("warming up")
        .expect(3)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client = test_client(&server.url(), &dir);
    assert!(client.get("/api/reports/weekly").await.is_err());
    flaky.assert_async().await;

    // Once the backend recovers, the read succeeds and caches normally.
    let recovered = server
        .mock("GET", "/api/reports/weekly")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"revenue": 18250}"#)
        .expect(1)
        .create_async()
        .await;

    let first = client.get("/api/reports/weekly").await.unwrap();
    let second = client.get("/api/reports/weekly").await.unwrap();
    assert_eq!(first, second);
    recovered.assert_async().await;
}
