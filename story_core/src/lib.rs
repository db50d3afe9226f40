//! Story generation against a hosted generative-AI service.
//!
//! [`StoryOrchestrator`] drives the text, speech and image capabilities
//! (implemented for Gemini by [`GeminiClient`]) and turns speech payloads
//! into decoded [`audio_core::AudioBuffer`]s.

pub mod cancel;
pub mod config;
pub mod error;
pub mod gemini;
pub mod orchestrator;
pub mod prompt;
pub mod types;

pub use cancel::CancellationToken;
pub use config::GeminiConfig;
pub use error::StoryError;
pub use gemini::{GeminiClient, ImageGenerator, ImagePayload, SpeechSynthesizer, TextGenerator};
pub use orchestrator::StoryOrchestrator;
pub use prompt::PromptLanguage;
pub use types::{ImageRef, OutputFormat, StoryRequest, StoryResult};
