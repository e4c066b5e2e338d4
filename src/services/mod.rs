//! Services layer - Business logic
//!
//! This module contains the business logic of the DevFlow question service.
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating repositories inside a single transaction
//! - Handling validation and error cases

pub mod question;
pub mod tag;
pub mod validation;

pub use question::{dedupe_labels, QuestionService, QuestionServiceError};
pub use tag::{TagService, TagServiceError};
pub use validation::{validate_create_question, validate_edit_question, ValidationError};
