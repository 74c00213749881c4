//! Integration tests for the reqwest transport against a local mock push service.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use webpush_dispatch::{
    Dispatcher, FileSubscriptionStore, HttpTransport, NotificationPayload, Outcome,
    PushSubscription, PushVendor, SubscriptionFilter, VapidKeys, VapidSigner,
};

fn dispatcher(keys: &VapidKeys) -> Dispatcher<HttpTransport> {
    let signer = VapidSigner::new(keys.clone(), "mailto:ops@example.com").unwrap();
    Dispatcher::new(signer, HttpTransport::with_timeout(Duration::from_secs(5)).unwrap())
}

#[tokio::test]
async fn test_posts_json_with_webpush_headers() {
    let server = MockServer::start().await;
    let keys = VapidKeys::generate();
    let payload = NotificationPayload::new("Hello", "World").with_icon("/icon.png");

    Mock::given(method("POST"))
        .and(path("/push/device-1"))
        .and(header("ttl", "86400"))
        .and(header("content-type", "application/json"))
        .and(header(
            "crypto-key",
            format!("p256ecdsa={}", keys.public_key_base64url()).as_str(),
        ))
        .and(header_exists("authorization"))
        .and(body_json(serde_json::json!({
            "title": "Hello",
            "body": "World",
            "icon": "/icon.png"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = format!("{}/push/device-1", server.uri());
    let report = dispatcher(&keys)
        .dispatch(
            vec![PushSubscription::new(endpoint, "p256dh", "auth")],
            &payload,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.sent, 1);
    let row = &report.results[0];
    assert_eq!(row.outcome, Outcome::Success);
    assert_eq!(row.endpoint_type, PushVendor::Generic);
    assert_eq!(row.http_status, Some(201));

    let received = server.received_requests().await.unwrap();
    let auth = received[0].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(auth.starts_with("WebPush ey"), "{auth}");
}

#[tokio::test]
async fn test_rejection_body_becomes_error_detail() {
    let server = MockServer::start().await;
    let keys = VapidKeys::generate();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(413).set_body_string("payload too large"))
        .mount(&server)
        .await;

    let report = dispatcher(&keys)
        .dispatch(
            vec![PushSubscription::new(format!("{}/p", server.uri()), "k", "a")],
            &serde_json::json!({"title": "x"}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let row = &report.results[0];
    assert_eq!(row.outcome, Outcome::Failed);
    assert_eq!(row.http_status, Some(413));
    assert_eq!(row.error_detail.as_deref(), Some("payload too large"));
    assert!(!row.removed);
}

#[tokio::test]
async fn test_gone_endpoint_removed_from_file_store() {
    let server = MockServer::start().await;
    let keys = VapidKeys::generate();
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/live"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let gone = format!("{}/gone", server.uri());
    let live = format!("{}/live", server.uri());
    let store_path = dir.path().join("subs.json");
    let store = FileSubscriptionStore::open(&store_path).unwrap();
    store.upsert(PushSubscription::new(&gone, "k", "a")).await.unwrap();
    store.upsert(PushSubscription::new(&live, "k", "a")).await.unwrap();

    let report = dispatcher(&keys)
        .dispatch_to_store(
            &store,
            &SubscriptionFilter::Broadcast,
            &NotificationPayload::new("t", "b"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(report.removed, 1);

    // Deletion was persisted
    let reopened = FileSubscriptionStore::open(&store_path).unwrap();
    let remaining = reopened.snapshot().await;
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains(&live));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_error_row() {
    let keys = VapidKeys::generate();
    // Port 9 (discard) on localhost is not listening in test environments.
    let report = dispatcher(&keys)
        .dispatch(
            vec![PushSubscription::new("http://127.0.0.1:9/push", "k", "a")],
            &serde_json::json!({}),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.results[0].outcome, Outcome::Error);
    assert!(report.results[0].http_status.is_none());
    assert_eq!(report.total_processed, 1);
}
