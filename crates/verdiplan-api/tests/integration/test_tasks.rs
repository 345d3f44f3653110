//! Integration tests for task mutations, listing and ping

use serde_json::json;
use wiremock::{
    matchers::{body_json, header, header_exists, method, path},
    Mock, ResponseTemplate,
};

use verdiplan_api::ApiError;
use verdiplan_core::domain::{IdempotencyKey, TaskId};
use verdiplan_core::ports::IRemoteApi;

use crate::common::{self, TEST_TOKEN};

#[tokio::test]
async fn test_create_task_sends_body_token_and_idempotency_key() {
    let (server, client) = common::setup_api_mock().await;
    let key = IdempotencyKey::new();
    let payload = json!({"title": "Trim hedges", "area": "North"});

    Mock::given(method("POST"))
        .and(path("/tasks"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(header("idempotency-key", key.to_string().as_str()))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 41, "title": "Trim hedges"})))
        .expect(1)
        .mount(&server)
        .await;

    let created = client.create_task(&payload, &key).await.expect("create");
    assert_eq!(created["id"], 41);
}

#[tokio::test]
async fn test_update_task_patches_entity_path() {
    let (server, client) = common::setup_api_mock().await;
    let key = IdempotencyKey::new();

    Mock::given(method("PATCH"))
        .and(path("/tasks/17"))
        .and(header_exists("idempotency-key"))
        .and(body_json(json!({"status": "done"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let id = TaskId::new("17").unwrap();
    let updated = client
        .update_task(&id, &json!({"status": "done"}), &key)
        .await
        .expect("update");
    assert!(updated.is_null());
}

#[tokio::test]
async fn test_error_statuses_are_mapped() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/tasks/9"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client
        .create_task(&json!({}), &IdempotencyKey::new())
        .await
        .unwrap_err();
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Unauthorized(msg)) => assert_eq!(msg, "token expired"),
        other => panic!("unexpected error: {other:?}"),
    }

    let err = client
        .update_task(&TaskId::new("9").unwrap(), &json!({}), &IdempotencyKey::new())
        .await
        .unwrap_err();
    let api_err = err.downcast_ref::<ApiError>().expect("ApiError");
    assert!(matches!(api_err, ApiError::ServerError { status: 503, .. }));
    assert!(api_err.is_transient());
}

#[tokio::test]
async fn test_list_tasks_returns_array() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "title": "Mow"},
            {"id": 2, "title": "Water"}
        ])))
        .mount(&server)
        .await;

    let tasks = client.list_tasks().await.expect("list");
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1]["title"], "Water");
}

#[tokio::test]
async fn test_list_tasks_rejects_non_array() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let err = client.list_tasks().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_ping_accepts_any_http_answer() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    client.ping().await.expect("reachable");
}

#[tokio::test]
async fn test_ping_fails_when_host_is_down() {
    let (server, client) = common::setup_api_mock().await;
    drop(server);

    let err = client.ping().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::NetworkError(_))
    ));
}
