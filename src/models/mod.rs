//! Data models
//!
//! This module contains the data structures used throughout DevFlow:
//! - Database entities (Question, Tag, TagQuestion)
//! - Service input types
//! - Pagination types

mod pagination;
mod question;
mod tag;

pub use pagination::{ListParams, PagedResult};
pub use question::{CreateQuestionInput, EditQuestionInput, Question, QuestionDetail};
pub use tag::{tag_name_key, Tag, TagFilter, TagListParams, TagQuestion};
