// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/api/test_upload_endpoints.rs - POST /ocr and POST /face

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::util::ServiceExt;

use crate::common::{
    body_string, empty_multipart_body, face_stub, multipart_body, multipart_content_type,
    png_bytes, temp_storage, test_app, text_stub,
};

const LIMIT: usize = 16 * 1024 * 1024;

fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_ocr_upload_renders_result() {
    let (dir, storage) = temp_storage();
    let app = test_app(Some(text_stub()), Some(face_stub()), storage, LIMIT);

    let body = multipart_body("image", "cat.png", &png_bytes(40, 30));
    let response = app.oneshot(upload_request("/ocr", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains("<img src=\"/static/results/cat.jpg\""));
    assert!(html.contains("Upload a photo to see OCR results."));

    assert!(dir.path().join("uploads").join("cat.png").exists());
    let result = image::open(dir.path().join("results").join("cat.jpg")).unwrap();
    assert_eq!((result.width(), result.height()), (40, 30));
}

#[tokio::test]
async fn test_face_upload_renders_result() {
    let (dir, storage) = temp_storage();
    let app = test_app(Some(text_stub()), Some(face_stub()), storage, LIMIT);

    let body = multipart_body("image", "group photo.png", &png_bytes(32, 32));
    let response = app.oneshot(upload_request("/face", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains("<img src=\"/static/results/group_photo.jpg\""));
    assert!(dir.path().join("results").join("group_photo.jpg").exists());
}

#[tokio::test]
async fn test_result_is_served_as_static_file() {
    let (_dir, storage) = temp_storage();
    let app = test_app(Some(text_stub()), Some(face_stub()), storage, LIMIT);

    let body = multipart_body("image", "cat.png", &png_bytes(16, 16));
    let response = app
        .clone()
        .oneshot(upload_request("/ocr", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/static/results/cat.jpg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
}

#[tokio::test]
async fn test_upload_path_components_are_stripped() {
    let (dir, storage) = temp_storage();
    let app = test_app(Some(text_stub()), None, storage, LIMIT);

    let body = multipart_body("image", "../../escape.png", &png_bytes(8, 8));
    let response = app.oneshot(upload_request("/ocr", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(dir.path().join("uploads").join("escape.png").exists());
    assert!(!dir.path().parent().unwrap().join("escape.png").exists());
}

#[tokio::test]
async fn test_empty_file_field_renders_plain_page() {
    let (dir, storage) = temp_storage();
    let app = test_app(Some(text_stub()), Some(face_stub()), storage, LIMIT);

    let response = app
        .oneshot(upload_request("/ocr", empty_multipart_body("image")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(!html.contains("<img"));
    assert_eq!(
        std::fs::read_dir(dir.path().join("results")).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_missing_image_field_renders_plain_page() {
    let (_dir, storage) = temp_storage();
    let app = test_app(Some(text_stub()), Some(face_stub()), storage, LIMIT);

    let body = multipart_body("document", "cat.png", &png_bytes(8, 8));
    let response = app.oneshot(upload_request("/face", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_string(response).await.contains("<img"));
}

#[tokio::test]
async fn test_undecodable_upload_is_bad_request() {
    let (dir, storage) = temp_storage();
    let app = test_app(Some(text_stub()), Some(face_stub()), storage, LIMIT);

    let body = multipart_body("image", "notes.png", b"definitely not an image");
    let response = app.oneshot(upload_request("/ocr", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let html = body_string(response).await;
    assert!(html.contains("class=\"notice\""));
    assert!(!html.contains("<img"));
    assert!(!dir.path().join("results").join("notes.jpg").exists());
}

#[tokio::test]
async fn test_disabled_model_is_unavailable() {
    let (_dir, storage) = temp_storage();
    let app = test_app(Some(text_stub()), None, storage, LIMIT);

    let body = multipart_body("image", "cat.png", &png_bytes(8, 8));
    let response = app.oneshot(upload_request("/face", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["error_type"], "service_unavailable");
    assert_eq!(json["details"]["kind"], "face");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let (_dir, storage) = temp_storage();
    let app = test_app(Some(text_stub()), Some(face_stub()), storage, 1024);

    let body = multipart_body("image", "big.png", &vec![0u8; 64 * 1024]);
    let response = app.oneshot(upload_request("/ocr", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_same_name_upload_replaces_previous_result() {
    let (dir, storage) = temp_storage();
    let app = test_app(Some(text_stub()), Some(face_stub()), storage, LIMIT);

    for (width, height) in [(20, 10), (30, 24)] {
        let body = multipart_body("image", "scan.png", &png_bytes(width, height));
        let response = app
            .clone()
            .oneshot(upload_request("/ocr", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let upload = image::open(dir.path().join("uploads").join("scan.png")).unwrap();
    assert_eq!((upload.width(), upload.height()), (30, 24));
    let result = image::open(dir.path().join("results").join("scan.jpg")).unwrap();
    assert_eq!((result.width(), result.height()), (30, 24));
}
