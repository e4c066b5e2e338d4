//! Question model
//!
//! This module provides:
//! - `Question` entity with its denormalized tag id list
//! - `QuestionDetail`, a question joined with its tags
//! - Input types for asking and editing questions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Tag;

/// Question entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier
    pub id: i64,
    /// Question title
    pub title: String,
    /// Markdown body
    pub content: String,
    /// Author user ID
    pub author_id: i64,
    /// Tag IDs in the order they were attached, without duplicates
    pub tag_ids: Vec<i64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Question {
    /// Append tag ids that are not already present, keeping first-seen order
    pub fn merge_tag_ids(&mut self, tag_ids: &[i64]) {
        for id in tag_ids {
            if !self.tag_ids.contains(id) {
                self.tag_ids.push(*id);
            }
        }
    }
}

/// A question together with its resolved tags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: Question,
    pub tags: Vec<Tag>,
}

/// Input for asking a new question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestionInput {
    pub title: String,
    pub content: String,
    /// Free-form labels, resolved to tags case-insensitively
    pub tags: Vec<String>,
    /// Verified ID of the asking user
    pub author_id: i64,
}

impl CreateQuestionInput {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<String>,
        author_id: i64,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            tags,
            author_id,
        }
    }
}

/// Input for editing an existing question's text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditQuestionInput {
    pub title: String,
    pub content: String,
}
