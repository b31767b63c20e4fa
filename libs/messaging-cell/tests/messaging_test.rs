use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use messaging_cell::models::{Message, MessagingError, SendMessageRequest};
use messaging_cell::services::MessagingService;
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

fn message(from_user: Uuid, to_user: Uuid, patient_id: Uuid, text: &str) -> Message {
    Message {
        id: Uuid::new_v4(),
        from_user,
        to_user,
        patient_id,
        message: text.to_string(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_send_message_persists_row() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let from_user = Uuid::new_v4();
    let to_user = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    let request = SendMessageRequest {
        from_user,
        to_user,
        patient_id,
        message: "Please review the referral before Monday's visit".to_string(),
    };
    let stored = message(from_user, to_user, patient_id, &request.message);

    Mock::given(method("POST"))
        .and(path("/rest/v1/messages"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({
            "from_user": from_user,
            "to_user": to_user,
            "patient_id": patient_id,
            "message": "Please review the referral before Monday's visit"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![
            serde_json::to_value(&stored).unwrap(),
        ]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = MessagingService::new(&config);
    let sent = service.send_message(&request).await.unwrap();

    assert_eq!(sent.id, stored.id);
    assert_eq!(sent.message, request.message);
}

#[tokio::test]
async fn test_send_message_requires_representation() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/rest/v1/messages"))
        .respond_with(ResponseTemplate::new(201).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let service = MessagingService::new(&config);
    let request = SendMessageRequest {
        from_user: Uuid::new_v4(),
        to_user: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        message: "hello".to_string(),
    };
    let result = service.send_message(&request).await;

    assert_matches!(result, Err(MessagingError::DatabaseError(_)));
}

#[tokio::test]
async fn test_list_messages_covers_both_directions() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    let newer = message(user_a, user_b, patient_id, "Labs are back");
    let older = message(user_b, user_a, patient_id, "Any update on the labs?");

    Mock::given(method("GET"))
        .and(path("/rest/v1/messages"))
        .and(query_param("from_user", format!("in.({},{})", user_a, user_b)))
        .and(query_param("to_user", format!("in.({},{})", user_a, user_b)))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            serde_json::to_value(&newer).unwrap(),
            serde_json::to_value(&older).unwrap(),
        ]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = MessagingService::new(&config);
    let conversation = service.list_messages(user_a, user_b, None).await.unwrap();

    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[0].id, newer.id);
    assert_eq!(conversation[1].from_user, user_b);
}

#[tokio::test]
async fn test_list_messages_narrows_to_patient_case() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    let row = message(user_a, user_b, patient_id, "Chart updated");

    Mock::given(method("GET"))
        .and(path("/rest/v1/messages"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            serde_json::to_value(&row).unwrap(),
        ]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = MessagingService::new(&config);
    let conversation = service
        .list_messages(user_a, user_b, Some(patient_id))
        .await
        .unwrap();

    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation[0].patient_id, patient_id);
}

#[tokio::test]
async fn test_list_messages_surfaces_store_failure() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("connection lost"))
        .mount(&mock_server)
        .await;

    let service = MessagingService::new(&config);
    let result = service.list_messages(Uuid::new_v4(), Uuid::new_v4(), None).await;

    assert_matches!(result, Err(MessagingError::DatabaseError(_)));
}
