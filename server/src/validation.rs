use story_core::StoryRequest;

use crate::error::ApiError;

/// Maximum length of the child's name
const MAX_NAME_LENGTH: usize = 100;
/// Maximum length of the free-text fields
const MAX_DESCRIPTION_LENGTH: usize = 1000;
/// Maximum story text accepted for an illustration
const MAX_STORY_TEXT_LENGTH: usize = 20_000;

/// Validate story request field sizes. Emptiness and the age format are
/// checked by the orchestrator itself.
pub fn validate_story_request(req: &StoryRequest) -> Result<(), ApiError> {
    check_length("name", &req.name, MAX_NAME_LENGTH)?;
    check_length("age", &req.age, 3)?;
    check_length("characteristics", &req.characteristics, MAX_DESCRIPTION_LENGTH)?;
    check_length("theme", &req.theme, MAX_DESCRIPTION_LENGTH)?;
    Ok(())
}

/// Validate illustration request
pub fn validate_illustration_request(story_id: &str, story_text: &str) -> Result<(), ApiError> {
    validate_story_id(story_id)?;
    if story_text.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "Story text cannot be empty".to_string(),
        ));
    }
    check_length("story_text", story_text, MAX_STORY_TEXT_LENGTH)
}

/// Validate story ID format (UUID)
pub fn validate_story_id(id: &str) -> Result<(), ApiError> {
    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| ApiError::InvalidInput(format!("Invalid story ID format: {}", id)))
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    let len = value.trim().chars().count();
    if len > max {
        return Err(ApiError::InvalidInput(format!(
            "Field '{}' too long (max {} characters)",
            field, max
        )));
    }
    Ok(())
}
