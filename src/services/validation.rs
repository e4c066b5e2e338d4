//! Input validation for questions
//!
//! Validation trims every field and returns the normalized input, so the
//! service layer only ever sees trimmed titles, bodies and labels.

use crate::models::{CreateQuestionInput, EditQuestionInput};

pub const TITLE_MIN_CHARS: usize = 5;
pub const TITLE_MAX_CHARS: usize = 100;
pub const MIN_TAGS: usize = 1;
pub const MAX_TAGS: usize = 3;
pub const TAG_MAX_CHARS: usize = 15;

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate and normalize a new question
pub fn validate_create_question(
    input: CreateQuestionInput,
) -> Result<CreateQuestionInput, ValidationError> {
    let title = validate_title(&input.title)?;
    let content = validate_content(&input.content)?;
    let tags = validate_tags(&input.tags)?;

    Ok(CreateQuestionInput {
        title,
        content,
        tags,
        author_id: input.author_id,
    })
}

/// Validate and normalize an edit
pub fn validate_edit_question(
    input: EditQuestionInput,
) -> Result<EditQuestionInput, ValidationError> {
    Ok(EditQuestionInput {
        title: validate_title(&input.title)?,
        content: validate_content(&input.content)?,
    })
}

fn validate_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    let len = title.chars().count();
    if len < TITLE_MIN_CHARS {
        return Err(ValidationError::new(
            "title",
            format!("must be at least {} characters", TITLE_MIN_CHARS),
        ));
    }
    if len > TITLE_MAX_CHARS {
        return Err(ValidationError::new(
            "title",
            format!("must be at most {} characters", TITLE_MAX_CHARS),
        ));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<String, ValidationError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ValidationError::new("content", "must not be empty"));
    }
    Ok(content.to_string())
}

fn validate_tags(tags: &[String]) -> Result<Vec<String>, ValidationError> {
    if tags.len() < MIN_TAGS {
        return Err(ValidationError::new(
            "tags",
            format!("at least {} tag is required", MIN_TAGS),
        ));
    }
    if tags.len() > MAX_TAGS {
        return Err(ValidationError::new(
            "tags",
            format!("at most {} tags are allowed", MAX_TAGS),
        ));
    }

    tags.iter()
        .map(|tag| {
            let tag = tag.trim();
            if tag.is_empty() {
                Err(ValidationError::new("tags", "tag must not be empty"))
            } else if tag.chars().count() > TAG_MAX_CHARS {
                Err(ValidationError::new(
                    "tags",
                    format!("tag \"{}\" exceeds {} characters", tag, TAG_MAX_CHARS),
                ))
            } else {
                Ok(tag.to_string())
            }
        })
        .collect()
}
