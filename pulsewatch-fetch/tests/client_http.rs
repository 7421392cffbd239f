// HTTP client behaviour against a mock Pulse API.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pulsewatch_fetch::{FetchError, PulseApi, PulseClient, SchemaIndex, UsageCounter};

// ============================================================================
// Helpers
// ============================================================================

async fn setup() -> (MockServer, PulseClient) {
    setup_with_timeout(Duration::from_secs(5)).await
}

async fn setup_with_timeout(timeout: Duration) -> (MockServer, PulseClient) {
    let server = MockServer::start().await;
    let usage = Arc::new(UsageCounter::new(Arc::new(SchemaIndex::bundled().unwrap())));
    let client = PulseClient::builder()
        .base_url(server.uri())
        .api_key("test-key")
        .timeout(timeout)
        .build(usage)
        .unwrap();
    (server, client)
}

fn two_devices() -> serde_json::Value {
    json!({
        "deviceViewDtos": [
            { "id": 1, "name": "Tent", "mostRecentDataPoint": { "temperatureF": 75.0 } },
            { "id": 2, "name": "Room", "mostRecentDataPoint": { "temperatureF": 80.0 } }
        ]
    })
}

// ============================================================================
// Success
// ============================================================================

#[tokio::test]
async fn test_success_is_billed_before_return() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/all-devices"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_devices()))
        .mount(&server)
        .await;

    let payload = client.get_all_devices().await.unwrap();

    assert_eq!(payload, two_devices());
    assert_eq!(client.usage().count_today().await, 2);
    assert!(client.usage().last_call_succeeded().await);
}

#[tokio::test]
async fn test_query_string_is_sent_and_ignored_for_billing() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/devices/7/data-range"))
        .and(query_param("start", "2025-07-18T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}, {}, {}, {}])))
        .mount(&server)
        .await;

    client
        .get("/devices/7/data-range?start=2025-07-18T00:00:00Z")
        .await
        .unwrap();

    assert_eq!(client.usage().count_today().await, 4);
}

#[tokio::test]
async fn test_owner_name() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "userName": "Helper", "role": "Viewer" },
            { "userName": "GrowMaster", "role": "Owner" }
        ])))
        .mount(&server)
        .await;

    assert_eq!(client.owner_name().await.unwrap(), "GrowMaster");
    assert_eq!(client.usage().count_today().await, 1);
}

// ============================================================================
// Failures are never billed
// ============================================================================

#[tokio::test]
async fn test_server_error_is_not_billed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/all-devices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client.get_all_devices().await;

    assert!(
        matches!(result, Err(FetchError::Status { status: 500, .. })),
        "expected Status error, got: {result:?}"
    );
    assert_eq!(client.usage().count_today().await, 0);
    assert!(!client.usage().last_call_succeeded().await);
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/all-devices"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let err = client.get_all_devices().await.unwrap_err();

    assert!(matches!(err, FetchError::RateLimited { retry_after: Some(30) }));
    assert!(err.is_transient());
    assert_eq!(client.usage().count_today().await, 0);
}

#[tokio::test]
async fn test_rejected_key() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.get_users().await.unwrap_err();

    assert!(matches!(err, FetchError::AuthenticationFailed(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_invalid_json_is_not_billed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/all-devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client.get_all_devices().await.unwrap_err();

    assert!(matches!(err, FetchError::Decode(_)));
    assert_eq!(client.usage().count_today().await, 0);
    assert!(!client.usage().last_call_succeeded().await);
}

#[tokio::test]
async fn test_timeout_is_not_billed() {
    let (server, client) = setup_with_timeout(Duration::from_millis(200)).await;

    Mock::given(method("GET"))
        .and(path("/all-devices"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(two_devices())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.get_all_devices().await.unwrap_err();

    assert!(matches!(err, FetchError::Timeout(_)), "got: {err:?}");
    assert_eq!(client.usage().count_today().await, 0);
    assert!(!client.usage().last_call_succeeded().await);
}

#[tokio::test]
async fn test_failure_after_success_keeps_count() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/all-devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(two_devices()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/all-devices"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    client.get_all_devices().await.unwrap();
    assert!(client.get_all_devices().await.is_err());

    assert_eq!(client.usage().count_today().await, 2);
    assert!(!client.usage().last_call_succeeded().await);
}
