use thiserror::Error;

/// Every failure the orchestrator reports. Raw transport errors never leave
/// the crate; they are folded into [`StoryError::Unexpected`].
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("{0}")]
    Validation(String),

    #[error("Generation cancelled")]
    Cancelled,

    /// The capability answered but without a usable payload. On the audio
    /// path the story text that was already generated rides along.
    #[error("{message}")]
    Synthesis {
        message: String,
        text: Option<String>,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl StoryError {
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis {
            message: message.into(),
            text: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short machine-readable tag for clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Cancelled => "cancelled",
            Self::Synthesis { .. } => "synthesis",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

impl From<anyhow::Error> for StoryError {
    fn from(e: anyhow::Error) -> Self {
        Self::Unexpected(format!("{e:#}"))
    }
}
