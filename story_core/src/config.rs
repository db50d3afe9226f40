// Gemini connection settings

use anyhow::bail;

use crate::prompt::PromptLanguage;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";
pub const DEFAULT_VOICE: &str = "Kore";

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub tts_model: String,
    pub image_model: String,
    pub voice: String,
    pub language: PromptLanguage,
}

// Keeps the key out of logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("tts_model", &self.tts_model)
            .field("image_model", &self.image_model)
            .field("voice", &self.voice)
            .field("language", &self.language)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            language: PromptLanguage::default(),
        }
    }

    /// Read settings from the environment. A missing API key is fatal.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let Some(api_key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")) else {
            bail!("GEMINI_API_KEY (or API_KEY) environment variable is not set");
        };

        let language = match non_empty("STORY_LANGUAGE") {
            Some(v) => match PromptLanguage::parse(&v) {
                Some(lang) => lang,
                None => bail!("Unsupported STORY_LANGUAGE '{v}'. Expected 'en' or 'pt'"),
            },
            None => PromptLanguage::default(),
        };

        let defaults = Self::new(api_key);
        Ok(Self {
            base_url: non_empty("GEMINI_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url.clone()),
            text_model: non_empty("GEMINI_TEXT_MODEL").unwrap_or(defaults.text_model.clone()),
            tts_model: non_empty("GEMINI_TTS_MODEL").unwrap_or(defaults.tts_model.clone()),
            image_model: non_empty("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model.clone()),
            voice: non_empty("GEMINI_VOICE").unwrap_or(defaults.voice.clone()),
            language,
            ..defaults
        })
    }
}
