//! Integration tests for the story endpoints

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(Arc::default());
    for uri in ["/health", "/api/health"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, "ok");
    }
}

#[tokio::test]
async fn test_text_story() {
    let fake = Arc::new(FakeGemini::default());
    let app = create_test_app(fake.clone());

    let (status, body) = send(&app, post_json("/api/story", story_body("text"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], STORY_TEXT);
    assert!(body.get("audio").is_none());
    assert!(uuid::Uuid::parse_str(body["story_id"].as_str().unwrap()).is_ok());
    assert_eq!(fake.calls(), 1);
}

#[tokio::test]
async fn test_numeric_age_and_default_format() {
    let fake = Arc::new(FakeGemini::default());
    let app = create_test_app(fake);
    let body = json!({ "name": "Ana", "age": 5, "characteristics": "curious", "theme": "forest" });

    let (status, body) = send(&app, post_json("/story", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("audio").is_none());
}

#[tokio::test]
async fn test_empty_theme_rejected_without_calls() {
    let fake = Arc::new(FakeGemini::default());
    let app = create_test_app(fake.clone());
    let mut req = story_body("audio");
    req["theme"] = json!("");

    let (status, body) = send(&app, post_json("/api/story", req)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert!(body["error"].is_string());
    assert_eq!(fake.calls(), 0);
}

#[tokio::test]
async fn test_overlong_field_rejected() {
    let fake = Arc::new(FakeGemini::default());
    let app = create_test_app(fake.clone());
    let mut req = story_body("text");
    req["characteristics"] = json!("a".repeat(1001));

    let (status, _) = send(&app, post_json("/api/story", req)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fake.calls(), 0);
}

#[tokio::test]
async fn test_missing_audio_payload_returns_text() {
    let fake = Arc::new(FakeGemini::default());
    let app = create_test_app(fake.clone());

    let (status, body) = send(&app, post_json("/api/story", story_body("audio"))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "synthesis");
    assert_eq!(body["text"], STORY_TEXT);
    assert_eq!(fake.speech_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_speech_failure_keeps_text_and_story_id() {
    let fake = Arc::new(FakeGemini {
        speech_fails: true,
        ..Default::default()
    });
    let app = create_test_app(fake.clone());

    let (status, body) = send(&app, post_json("/api/story", story_body("audio"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "synthesis");
    assert_eq!(body["text"], STORY_TEXT);
    let story_id = body["story_id"].as_str().unwrap().to_string();

    // the salvaged text can still be illustrated
    let req = json!({ "story_id": story_id, "story_text": STORY_TEXT });
    let (status, body) = send(&app, post_json("/api/illustration", req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["story_id"], story_id);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let fake = Arc::new(FakeGemini::default());
    let app = create_test_app(fake.clone());
    let payload = json!({
        "name": "Ana",
        "age": "5",
        "characteristics": "x".repeat(100 * 1024),
        "theme": "forest"
    })
    .to_string();
    let req = Request::builder()
        .method("POST")
        .uri("/api/story")
        .header("content-type", "application/json")
        .header("content-length", payload.len())
        .body(Body::from(payload))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(fake.calls(), 0);
}

#[tokio::test]
async fn test_cancel_with_nothing_in_flight() {
    let app = create_test_app(Arc::default());
    let (status, body) = send(&app, post_empty("/api/story/cancel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);

    let (status, body) = send(&app, post_empty("/api/illustration/cancel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn test_illustration_requires_valid_story_id() {
    let fake = Arc::new(FakeGemini::default());
    let app = create_test_app(fake.clone());
    let req = json!({ "story_id": "nope", "story_text": STORY_TEXT });

    let (status, _) = send(&app, post_json("/api/illustration", req)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fake.calls(), 0);
}

#[tokio::test]
async fn test_illustration_for_unknown_story_is_superseded() {
    let fake = Arc::new(FakeGemini::default());
    let app = create_test_app(fake.clone());
    let req = json!({
        "story_id": uuid::Uuid::new_v4().to_string(),
        "story_text": STORY_TEXT
    });

    let (status, body) = send(&app, post_json("/api/illustration", req)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "superseded");
    assert_eq!(fake.calls(), 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fake = Arc::new(FakeGemini::default());
    let app = create_test_app(fake);
    send(&app, post_json("/api/story", story_body("text"))).await;

    let (status, body) = send(
        &app,
        Request::builder().uri("/api/metrics").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["story"]["request_count"], 1);
    assert_eq!(body["generation"]["text_stories"], 1);
    assert!(body["system"]["memory_total_mb"].is_number());
}
