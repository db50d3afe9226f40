//! Sequencing of the generation calls.
//!
//! Story generation is text first, then (for audio output) speech synthesis
//! on the generated text. Illustration is a separate request with its own
//! token. Every external call races its token; whatever arrives after a
//! cancel is thrown away.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use audio_core::{decode_pcm16, SPEECH_CHANNELS, SPEECH_SAMPLE_RATE};
use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::config::{GeminiConfig, DEFAULT_VOICE};
use crate::error::StoryError;
use crate::gemini::{GeminiClient, ImageGenerator, SpeechSynthesizer, TextGenerator};
use crate::prompt::{illustration_prompt, story_prompt, PromptLanguage};
use crate::types::{ImageRef, OutputFormat, StoryRequest, StoryResult};

#[derive(Clone)]
pub struct StoryOrchestrator {
    text: Arc<dyn TextGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
    image: Arc<dyn ImageGenerator>,
    voice: String,
    language: PromptLanguage,
}

impl StoryOrchestrator {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        image: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            text,
            speech,
            image,
            voice: DEFAULT_VOICE.to_string(),
            language: PromptLanguage::default(),
        }
    }

    /// All three capabilities backed by one Gemini client.
    pub fn from_config(config: GeminiConfig) -> anyhow::Result<Self> {
        let voice = config.voice.clone();
        let language = config.language;
        let client = Arc::new(GeminiClient::new(config)?);
        Ok(Self::new(client.clone(), client.clone(), client)
            .with_voice(voice)
            .with_language(language))
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_language(mut self, language: PromptLanguage) -> Self {
        self.language = language;
        self
    }

    pub async fn generate(
        &self,
        request: &StoryRequest,
        format: OutputFormat,
        cancel: &CancellationToken,
    ) -> Result<StoryResult, StoryError> {
        request.validate()?;
        let started = Instant::now();

        let prompt = story_prompt(request, self.language);
        let text = run_cancellable(cancel, self.text.generate_text(&prompt)).await?;
        info!(
            chars = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "story text generated"
        );

        if format == OutputFormat::Text {
            return Ok(StoryResult { text, audio: None });
        }

        let payload = run_cancellable(cancel, self.speech.synthesize_speech(&text, &self.voice))
            .await
            .map_err(|e| keep_text(e, &text))?;
        let Some(payload) = payload else {
            warn!("speech response carried no inline audio");
            return Err(StoryError::Synthesis {
                message: "Could not generate the story audio".to_string(),
                text: Some(text),
            });
        };

        let bytes = match general_purpose::STANDARD.decode(payload.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "speech payload is not valid base64");
                return Err(StoryError::Synthesis {
                    message: "The story audio could not be decoded".to_string(),
                    text: Some(text),
                });
            }
        };

        let audio = decode_pcm16(&bytes, SPEECH_SAMPLE_RATE, SPEECH_CHANNELS);
        info!(
            frames = audio.frames(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "story audio generated"
        );
        Ok(StoryResult {
            text,
            audio: Some(Arc::new(audio)),
        })
    }

    pub async fn generate_illustration(
        &self,
        story_text: &str,
        cancel: &CancellationToken,
    ) -> Result<ImageRef, StoryError> {
        if story_text.trim().is_empty() {
            return Err(StoryError::Validation(
                "A story is needed before creating an illustration".to_string(),
            ));
        }

        let prompt = illustration_prompt(story_text);
        let payload = run_cancellable(cancel, self.image.generate_image(&prompt)).await?;
        let image = payload.ok_or_else(|| StoryError::synthesis("Could not generate the illustration"))?;
        debug!(mime = %image.mime_type, "illustration generated");
        Ok(ImageRef::from_base64(&image.mime_type, &image.base64_data))
    }
}

/// Await `call` unless `cancel` fires first. Failures become `Unexpected`.
async fn run_cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T, StoryError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(StoryError::Cancelled);
    }

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(StoryError::Cancelled),
        outcome = call => outcome,
    };

    // late response after a cancel is discarded
    if cancel.is_cancelled() {
        return Err(StoryError::Cancelled);
    }
    outcome.map_err(StoryError::from)
}

/// A speech failure after the text succeeded still hands the text back.
fn keep_text(err: StoryError, text: &str) -> StoryError {
    match err {
        StoryError::Cancelled => StoryError::Cancelled,
        StoryError::Synthesis { message, .. } => StoryError::Synthesis {
            message,
            text: Some(text.to_string()),
        },
        other => {
            warn!(error = %other, "speech synthesis failed");
            StoryError::Synthesis {
                message: "Could not generate the story audio".to_string(),
                text: Some(text.to_string()),
            }
        }
    }
}
