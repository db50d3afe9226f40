use serde::{Deserialize, Serialize};

use crate::types::StoryRequest;

/// Language the story is written (and narrated) in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptLanguage {
    #[default]
    English,
    Portuguese,
}

impl PromptLanguage {
    /// Accepts `en`/`english` and `pt`/`pt-BR`/`portuguese`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "en_us" | "english" => Some(Self::English),
            "pt" | "pt-br" | "pt_br" | "portuguese" => Some(Self::Portuguese),
            _ => None,
        }
    }
}

pub fn story_prompt(req: &StoryRequest, language: PromptLanguage) -> String {
    let name = req.name.trim();
    let age = req.age.trim();
    let characteristics = req.characteristics.trim();
    let theme = req.theme.trim();

    match language {
        PromptLanguage::English => format!(
            "You are a children's storyteller who writes magical, educational tales. \
             Write a short story for {name}, a {age}-year-old child. \
             Take {name}'s traits into account: \"{characteristics}\". \
             The story must be about \"{theme}\". \
             Keep it positive, use simple language suited to the child's age, \
             and end with a gentle lesson or moral. \
             Do not include a title; start directly with the story."
        ),
        PromptLanguage::Portuguese => format!(
            "Você é um contador de histórias infantis especialista em criar narrativas mágicas e educativas. \
             Crie uma história curta para {name}, uma criança de {age} anos de idade. \
             Leve em conta as seguintes características de {name}: \"{characteristics}\". \
             A história deve ser sobre o tema \"{theme}\". \
             A narrativa precisa ser positiva, com linguagem simples e apropriada para a idade, \
             e terminar com uma lição ou moral gentil. \
             Não inclua um título, comece diretamente com a história."
        ),
    }
}

/// Image prompt derived from the finished story text.
pub fn illustration_prompt(story_text: &str) -> String {
    format!(
        "A warm, colorful children's book illustration in a soft watercolor style, \
         with no text or lettering, depicting the following story: {}",
        story_text.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StoryRequest {
        StoryRequest {
            name: " Ana ".into(),
            age: "5".into(),
            characteristics: "curious".into(),
            theme: "forest".into(),
        }
    }

    #[test]
    fn test_prompt_embeds_fields() {
        let p = story_prompt(&request(), PromptLanguage::English);
        assert!(p.contains("for Ana, a 5-year-old"));
        assert!(p.contains("\"curious\""));
        assert!(p.contains("\"forest\""));
        assert!(p.contains("moral"));
        assert!(p.contains("Do not include a title"));
    }

    #[test]
    fn test_portuguese_prompt() {
        let p = story_prompt(&request(), PromptLanguage::Portuguese);
        assert!(p.contains("Ana, uma criança de 5 anos"));
    }

    #[test]
    fn test_parse_language() {
        assert_eq!(PromptLanguage::parse("pt-BR"), Some(PromptLanguage::Portuguese));
        assert_eq!(PromptLanguage::parse("EN"), Some(PromptLanguage::English));
        assert_eq!(PromptLanguage::parse("de"), None);
    }
}
