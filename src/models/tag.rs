//! Tag model
//!
//! This module defines the Tag entity, the question-tag link and the
//! parameters for listing tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag entity.
///
/// `name` keeps the casing of the label that first created the tag. Lookups
/// go through [`tag_name_key`], so "Rust" and "rust" are the same tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Number of questions that have used this tag
    pub question_count: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Association between a question and a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagQuestion {
    pub question_id: i64,
    pub tag_id: i64,
}

/// Case-insensitive identity of a tag name
pub fn tag_name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Sort order for tag listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagFilter {
    /// Most used first
    #[default]
    Popular,
    /// Newest first
    Recent,
    /// Oldest first
    Oldest,
    /// Alphabetical
    Name,
}

impl TagFilter {
    /// ORDER BY clause for this filter
    pub fn order_by(&self) -> &'static str {
        match self {
            TagFilter::Popular => "question_count DESC, name_key ASC",
            TagFilter::Recent => "created_at DESC, id DESC",
            TagFilter::Oldest => "created_at ASC, id ASC",
            TagFilter::Name => "name_key ASC",
        }
    }

    /// Parse a filter name, falling back to `Popular` for unknown values
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "recent" => TagFilter::Recent,
            "oldest" => TagFilter::Oldest,
            "name" => TagFilter::Name,
            _ => TagFilter::Popular,
        }
    }
}

/// Parameters for listing tags
#[derive(Debug, Clone, Default)]
pub struct TagListParams {
    pub page: super::ListParams,
    /// Case-insensitive substring of the tag name
    pub query: Option<String>,
    pub filter: TagFilter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_name_key_folds_case() {
        assert_eq!(tag_name_key("Go"), tag_name_key("go"));
        assert_eq!(tag_name_key("ÉCOLE"), "école");
    }

    #[test]
    fn test_tag_filter_parse() {
        assert_eq!(TagFilter::parse("recent"), TagFilter::Recent);
        assert_eq!(TagFilter::parse("OLDEST"), TagFilter::Oldest);
        assert_eq!(TagFilter::parse("name"), TagFilter::Name);
        assert_eq!(TagFilter::parse("anything"), TagFilter::Popular);
    }
}
