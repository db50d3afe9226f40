//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use server::{build_router, config::ServerConfig, AppState};
use story_core::{ImageGenerator, ImagePayload, SpeechSynthesizer, StoryOrchestrator, TextGenerator};
use tower::ServiceExt;

pub const STORY_TEXT: &str = "Ana tiptoed into the whispering forest and learned that listening is a kind of magic.";

/// Stand-in for the Gemini capabilities.
#[derive(Default)]
pub struct FakeGemini {
    pub text_calls: AtomicUsize,
    pub speech_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    /// Raw PCM returned (base64-encoded) by speech synthesis; `None` means no payload.
    pub pcm: Option<Vec<u8>>,
    pub text_delay: Option<Duration>,
    pub image_delay: Option<Duration>,
    /// Speech synthesis fails at the transport level.
    pub speech_fails: bool,
}

impl FakeGemini {
    pub fn calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
            + self.speech_calls.load(Ordering::SeqCst)
            + self.image_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeGemini {
    async fn generate_text(&self, _prompt: &str) -> anyhow::Result<String> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.text_delay {
            tokio::time::sleep(d).await;
        }
        Ok(STORY_TEXT.to_string())
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeGemini {
    async fn synthesize_speech(&self, _text: &str, _voice: &str) -> anyhow::Result<Option<String>> {
        self.speech_calls.fetch_add(1, Ordering::SeqCst);
        if self.speech_fails {
            anyhow::bail!("503 Service Unavailable");
        }
        Ok(self.pcm.as_ref().map(|pcm| general_purpose::STANDARD.encode(pcm)))
    }
}

#[async_trait]
impl ImageGenerator for FakeGemini {
    async fn generate_image(&self, _description: &str) -> anyhow::Result<Option<ImagePayload>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.image_delay {
            tokio::time::sleep(d).await;
        }
        Ok(Some(ImagePayload {
            mime_type: "image/png".to_string(),
            base64_data: "iVBORw0KGgo=".to_string(),
        }))
    }
}

/// Create a test app instance backed by `fake`
pub fn create_test_app(fake: Arc<FakeGemini>) -> Router {
    let orchestrator = StoryOrchestrator::new(fake.clone(), fake.clone(), fake);
    let config = ServerConfig {
        rate_limit_per_minute: 10_000,
        ..ServerConfig::default()
    };
    build_router(AppState::new(orchestrator, config)).expect("router")
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub fn story_body(format: &str) -> serde_json::Value {
    serde_json::json!({
        "name": "Ana",
        "age": "5",
        "characteristics": "curious",
        "theme": "forest",
        "format": format
    })
}
