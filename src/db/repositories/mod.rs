//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for a specific entity.
//! Methods taking `&mut UnitOfWork` run inside the caller's transaction.

pub mod question;
pub mod tag;
pub mod tag_question;

pub use question::{QuestionRepository, SqlxQuestionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use tag_question::{DuplicateLinkError, SqlxTagQuestionRepository, TagQuestionRepository};
