//! Integration tests for photo uploads

use wiremock::{
    matchers::{header, method, path},
    Mock, ResponseTemplate,
};

use verdiplan_api::ApiError;
use verdiplan_core::ports::IRemoteApi;

use crate::common::{self, TEST_TOKEN};

#[tokio::test]
async fn test_upload_media_sends_multipart_photos_field() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("POST"))
        .and(path("/tasks/T-1/photos"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let photo = common::pending_photo("T-1", "garden.jpg", b"\xFF\xD8jpegdata");
    client.upload_media(&photo).await.expect("upload");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);

    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"photos\""));
    assert!(body.contains("filename=\"garden.jpg\""));
    assert!(body.contains("image/jpeg"));
    assert!(body.contains("jpegdata"));
}

#[tokio::test]
async fn test_upload_media_failure_status_is_error() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("POST"))
        .and(path("/tasks/T-1/photos"))
        .respond_with(ResponseTemplate::new(413).set_body_string("too large"))
        .mount(&server)
        .await;

    let photo = common::pending_photo("T-1", "huge.jpg", b"data");
    let err = client.upload_media(&photo).await.unwrap_err();
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Rejected { status, message }) => {
            assert_eq!(*status, 413);
            assert_eq!(message, "too large");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_media_with_bad_mime_type_is_request_error() {
    let (server, client) = common::setup_api_mock().await;

    let mut photo = common::pending_photo("T-1", "odd.bin", b"data");
    photo.mime_type = "image".to_string();

    let err = client.upload_media(&photo).await.unwrap_err();
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::InvalidRequest(message)) => assert!(message.contains("'image'")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.downcast_ref::<ApiError>().unwrap().is_transient());

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests.is_empty());
}
