use std::sync::Arc;

use audio_core::AudioBuffer;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StoryError;

/// What the form collects about the child.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRequest {
    pub name: String,
    /// Kept as entered; must parse as a positive integer.
    #[serde(deserialize_with = "string_or_number")]
    pub age: String,
    pub characteristics: String,
    pub theme: String,
}

impl StoryRequest {
    /// Check every field is filled in. Runs before any network call.
    pub fn validate(&self) -> Result<(), StoryError> {
        let fields = [
            ("name", &self.name),
            ("age", &self.age),
            ("characteristics", &self.characteristics),
            ("theme", &self.theme),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(StoryError::Validation(format!(
                "Please fill in every field to create the story (missing: {})",
                missing.join(", ")
            )));
        }

        match self.age.trim().parse::<u32>() {
            Ok(age) if age > 0 => Ok(()),
            _ => Err(StoryError::Validation(format!(
                "Age must be a positive whole number, got '{}'",
                self.age.trim()
            ))),
        }
    }
}

// Number inputs arrive as either `"5"` or `5` depending on the client.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Audio,
}

/// One finished generation. Replaced as a whole by the next one.
#[derive(Debug, Clone)]
pub struct StoryResult {
    pub text: String,
    pub audio: Option<Arc<AudioBuffer>>,
}

/// Displayable image reference, a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn from_base64(mime_type: &str, data: &str) -> Self {
        Self(format!("data:{mime_type};base64,{data}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
