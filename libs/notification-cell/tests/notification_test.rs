use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::models::{CancellationNotice, NotificationError};
use notification_cell::services::dispatch::{cancellation_body, cancellation_title};
use notification_cell::services::{CancellationNotifier, PushGatewayClient, WebPushGatewayClient};
use shared_config::AppConfig;

fn test_config(store_url: &str) -> AppConfig {
    AppConfig {
        data_store_url: store_url.to_string(),
        data_store_service_key: "test-service-key".to_string(),
        push_gateway_url: String::new(),
        push_gateway_key: String::new(),
        webpush_gateway_url: String::new(),
    }
}

fn notice() -> CancellationNotice {
    CancellationNotice {
        appointment_id: Uuid::new_v4(),
        patient_name: "Maria Ivanova".to_string(),
        patient_record_id: "MRN-1042".to_string(),
        slot_time: "10:00 AM".to_string(),
    }
}

// ==============================================================================
// WORDING TESTS
// ==============================================================================

#[test]
fn test_cancellation_wording_defaults_to_english() {
    let notice = notice();

    assert_eq!(
        cancellation_title(None, &notice),
        "Appointment for Maria Ivanova (10:00 AM) has been cancelled."
    );
    assert_eq!(cancellation_body(None), "Reason: the doctor's schedule has changed.");

    // Unknown locales fall back to English too.
    assert_eq!(cancellation_title(Some("de"), &notice), cancellation_title(None, &notice));
}

#[test]
fn test_cancellation_wording_in_russian() {
    let notice = notice();

    assert_eq!(
        cancellation_title(Some("ru"), &notice),
        "Приём пациента Maria Ivanova (10:00 AM) отменён."
    );
    assert_eq!(cancellation_body(Some("ru")), "Причина: изменение графика врача.");
}

// ==============================================================================
// GATEWAY CLIENT TESTS
// ==============================================================================

#[tokio::test]
async fn test_push_gateway_sends_keyed_request() {
    let gateway = MockServer::start().await;
    let mut config = test_config("http://unused.test");
    config.push_gateway_url = gateway.uri();
    config.push_gateway_key = "server-key-1".to_string();

    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("Authorization", "key=server-key-1"))
        .and(body_partial_json(json!({
            "title": "Title",
            "body": "Body",
            "registration_ids": ["device-1", "device-2"]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&gateway)
        .await;

    let client = PushGatewayClient::new(&config).unwrap();
    client
        .send("Title", "Body", &["device-1".to_string(), "device-2".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_push_gateway_surfaces_upstream_failure() {
    let gateway = MockServer::start().await;
    let mut config = test_config("http://unused.test");
    config.push_gateway_url = gateway.uri();
    config.push_gateway_key = "server-key-1".to_string();

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream unavailable"))
        .mount(&gateway)
        .await;

    let client = PushGatewayClient::new(&config).unwrap();
    let result = client.send("Title", "Body", &["device-1".to_string()]).await;

    assert_matches!(
        result,
        Err(NotificationError::GatewayError { ref message })
            if message.contains("500") && message.contains("upstream unavailable")
    );
}

#[tokio::test]
async fn test_push_gateway_refuses_missing_configuration() {
    let config = test_config("http://unused.test");

    let result = PushGatewayClient::new(&config);

    assert_matches!(result, Err(NotificationError::NotConfigured));
}

#[tokio::test]
async fn test_webpush_gateway_posts_stored_subscription() {
    let gateway = MockServer::start().await;
    let mut config = test_config("http://unused.test");
    config.webpush_gateway_url = gateway.uri();

    let subscription = json!({
        "endpoint": "https://push.browser.test/sub/abc",
        "keys": { "p256dh": "pk", "auth": "ak" }
    });

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({
            "subscription": { "endpoint": "https://push.browser.test/sub/abc" },
            "title": "Title",
            "body": "MRN-1042"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&gateway)
        .await;

    let client = WebPushGatewayClient::new(&config).unwrap();
    client.send(&subscription, "Title", "MRN-1042").await.unwrap();
}

// ==============================================================================
// DISPATCH TESTS
// ==============================================================================

#[tokio::test]
async fn test_notifier_fans_out_to_both_channels() {
    let mock_server = MockServer::start().await;
    let push_gateway = MockServer::start().await;
    let webpush_gateway = MockServer::start().await;

    let mut config = test_config(&mock_server.uri());
    config.push_gateway_url = push_gateway.uri();
    config.push_gateway_key = "server-key-1".to_string();
    config.webpush_gateway_url = webpush_gateway.uri();

    let notice = notice();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_push_recipients"))
        .and(query_param("appointment_id", format!("eq.{}", notice.appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            json!({ "appointment_id": notice.appointment_id, "device_token": "device-1", "locale": null }),
            json!({ "appointment_id": notice.appointment_id, "device_token": "device-2", "locale": "ru" }),
        ]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_webpush_recipients"))
        .and(query_param("appointment_id", format!("eq.{}", notice.appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![json!({
            "appointment_id": notice.appointment_id,
            "subscription": { "endpoint": "https://push.browser.test/sub/abc" },
            "locale": null
        })]))
        .mount(&mock_server)
        .await;

    // One request per device token.
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&push_gateway)
        .await;

    // Browser notices carry the record id in the body.
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({
            "title": "Appointment for Maria Ivanova (10:00 AM) has been cancelled.",
            "body": "MRN-1042"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webpush_gateway)
        .await;

    let notifier = CancellationNotifier::new(&config);
    notifier.notify_cancellation(&notice).await;
}

#[tokio::test]
async fn test_notifier_swallows_gateway_failure() {
    let mock_server = MockServer::start().await;
    let push_gateway = MockServer::start().await;

    let mut config = test_config(&mock_server.uri());
    config.push_gateway_url = push_gateway.uri();
    config.push_gateway_key = "server-key-1".to_string();

    let notice = notice();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_push_recipients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![json!({
            "appointment_id": notice.appointment_id,
            "device_token": "device-1",
            "locale": null
        })]))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("gateway down"))
        .expect(1)
        .mount(&push_gateway)
        .await;

    // Completing without an error is the contract: delivery is best effort.
    let notifier = CancellationNotifier::new(&config);
    notifier.notify_cancellation(&notice).await;
}

#[tokio::test]
async fn test_notifier_delivers_concurrent_batches() {
    let mock_server = MockServer::start().await;
    let push_gateway = MockServer::start().await;

    let mut config = test_config(&mock_server.uri());
    config.push_gateway_url = push_gateway.uri();
    config.push_gateway_key = "server-key-1".to_string();

    let notices: Vec<CancellationNotice> = (0..3).map(|_| notice()).collect();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_push_recipients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![json!({
            "appointment_id": Uuid::new_v4(),
            "device_token": "device-1",
            "locale": null
        })]))
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&push_gateway)
        .await;

    let notifier = CancellationNotifier::new(&config);
    futures::future::join_all(notices.iter().map(|n| notifier.notify_cancellation(n))).await;
}

#[tokio::test]
async fn test_notifier_skips_recipient_lookup_when_unconfigured() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_push_recipients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_webpush_recipients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let notifier = CancellationNotifier::new(&config);
    notifier.notify_cancellation(&notice()).await;
}
