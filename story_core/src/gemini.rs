//! External generation capabilities and their Gemini REST implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;

/// Prompt in, story text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String>;
}

/// Text in, base64 PCM (24 kHz mono, 16-bit LE) out. `Ok(None)` means the
/// service answered without an inline audio payload.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Option<String>>;
}

/// Image payload returned by the image capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub base64_data: String,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, description: &str) -> Result<Option<ImagePayload>>;
}

/// Structure for the generateContent request
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: Vec<&'a str>,
    speech_config: SpeechConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

/// Structure for the generateContent response
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[allow(dead_code)]
    mime_type: Option<String>,
    data: Option<String>,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Text of the first candidate, parts joined.
    pub(crate) fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Inline payload of the first part of the first candidate.
    pub(crate) fn inline_audio(&self) -> Option<String> {
        self.first_parts()
            .first()
            .and_then(|p| p.inline_data.as_ref())
            .and_then(|d| d.data.clone())
            .filter(|d| !d.is_empty())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters,
}

#[derive(Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    aspect_ratio: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

impl PredictResponse {
    pub(crate) fn image(&self) -> Option<ImagePayload> {
        let p = self.predictions.first()?;
        let data = p.bytes_base64_encoded.clone().filter(|d| !d.is_empty())?;
        Some(ImagePayload {
            mime_type: p.mime_type.clone().unwrap_or_else(|| "image/png".to_string()),
            base64_data: data,
        })
    }
}

/// Client for the Gemini REST API. Implements all three capabilities.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.config.base_url, model, method)
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini returned {status}: {}", detail.trim());
        }

        response
            .json::<R>()
            .await
            .context("Gemini response was not valid JSON")
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let url = self.model_url(&self.config.text_model, "generateContent");
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![TextPart { text: prompt }],
            }],
            generation_config: None,
        };

        let response: GenerateContentResponse = self.post(&url, &body).await?;
        response
            .text()
            .context("Gemini returned no story text")
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Option<String>> {
        let url = self.model_url(&self.config.tts_model, "generateContent");
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![TextPart { text }],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: voice },
                    },
                },
            }),
        };

        let response: GenerateContentResponse = self.post(&url, &body).await?;
        Ok(response.inline_audio())
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, description: &str) -> Result<Option<ImagePayload>> {
        let url = self.model_url(&self.config.image_model, "predict");
        let body = PredictRequest {
            instances: vec![PredictInstance { prompt: description }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: "4:3",
            },
        };

        let response: PredictResponse = self.post(&url, &body).await?;
        Ok(response.image())
    }
}
