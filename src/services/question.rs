//! Question service
//!
//! Asking a question writes to three tables: the question row, its tags and
//! the question-tag links. `create_question` runs all of it in one
//! [`UnitOfWork`] so a question never becomes visible without its tags, and
//! a tag count is never bumped for a question that was not saved.
//!
//! Steps inside the transaction:
//! 1. insert the question with an empty tag list
//! 2. resolve each distinct label to a tag (creating or counting it)
//! 3. write the link rows
//! 4. attach the tag ids to the question
//!
//! Any failure, or running past the configured transaction timeout, rolls
//! the whole unit back.

use crate::db::repositories::{
    DuplicateLinkError, QuestionRepository, TagQuestionRepository, TagRepository,
};
use crate::db::{ConnectionManager, UnitOfWork};
use crate::models::{
    tag_name_key, CreateQuestionInput, EditQuestionInput, Question, QuestionDetail,
};
use crate::services::validation::{self, ValidationError};
use anyhow::{anyhow, Context};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on the transactional part of a write
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Error types for question service operations
#[derive(Debug, thiserror::Error)]
pub enum QuestionServiceError {
    /// Malformed input; nothing was read or written
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requesting user may not modify this question
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Question not found
    #[error("Question not found: {0}")]
    NotFound(String),

    /// The transaction failed or timed out and was rolled back
    #[error("Transaction aborted: {0:#}")]
    TransactionAborted(anyhow::Error),

    /// A link for this pair already existed inside the transaction
    #[error("Question {question_id} is already linked to tag {tag_id}")]
    DuplicateLink { question_id: i64, tag_id: i64 },

    /// Internal error
    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl From<ValidationError> for QuestionServiceError {
    fn from(err: ValidationError) -> Self {
        QuestionServiceError::Validation(err.to_string())
    }
}

/// Labels in input order with case-insensitive repeats removed.
///
/// The first spelling of each label wins: `["Go", "go", "Rust"]` gives
/// `["Go", "Rust"]`.
pub fn dedupe_labels(labels: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    labels
        .iter()
        .map(String::as_str)
        .filter(|label| seen.insert(tag_name_key(label)))
        .collect()
}

/// Service coordinating question writes
pub struct QuestionService {
    connections: Arc<ConnectionManager>,
    questions: Arc<dyn QuestionRepository>,
    tags: Arc<dyn TagRepository>,
    links: Arc<dyn TagQuestionRepository>,
    transaction_timeout: Duration,
}

impl QuestionService {
    /// Create a new question service
    pub fn new(
        connections: Arc<ConnectionManager>,
        questions: Arc<dyn QuestionRepository>,
        tags: Arc<dyn TagRepository>,
        links: Arc<dyn TagQuestionRepository>,
    ) -> Self {
        Self {
            connections,
            questions,
            tags,
            links,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }

    /// Bound the transactional steps of each write by `timeout`
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Ask a new question.
    ///
    /// Returns the saved question with one tag id per distinct label.
    pub async fn create_question(
        &self,
        input: CreateQuestionInput,
    ) -> Result<Question, QuestionServiceError> {
        let input = validation::validate_create_question(input)?;
        let labels = dedupe_labels(&input.tags);

        let mut uow = self.begin().await?;
        let outcome = tokio::time::timeout(
            self.transaction_timeout,
            self.write_question(&mut uow, &input, &labels),
        )
        .await
        .unwrap_or_else(|_| Err(self.timeout_error()));

        match outcome {
            Ok(question) => {
                self.commit(uow).await?;
                tracing::info!(
                    "Created question {} by user {} with tags {:?}",
                    question.id,
                    question.author_id,
                    question.tag_ids
                );
                Ok(question)
            }
            Err(e) => {
                rollback(uow).await;
                Err(classify(e))
            }
        }
    }

    async fn write_question(
        &self,
        uow: &mut UnitOfWork,
        input: &CreateQuestionInput,
        labels: &[&str],
    ) -> anyhow::Result<Question> {
        let mut question = self
            .questions
            .insert(uow, &input.title, &input.content, input.author_id)
            .await?;

        let mut tag_ids = Vec::with_capacity(labels.len());
        for label in labels {
            let tag = self.tags.find_or_create(uow, label).await?;
            tracing::debug!(
                "Resolved label {:?} to tag {} (count {})",
                label,
                tag.id,
                tag.question_count
            );
            tag_ids.push(tag.id);
        }

        self.links.insert_links(uow, question.id, &tag_ids).await?;
        question.tag_ids = self
            .questions
            .attach_tag_ids(uow, question.id, &tag_ids)
            .await?;

        Ok(question)
    }

    /// Edit a question's title and content.
    ///
    /// Only the author may edit. Tags are left as they are.
    pub async fn edit_question(
        &self,
        id: i64,
        input: EditQuestionInput,
        requesting_user_id: i64,
    ) -> Result<Question, QuestionServiceError> {
        let existing = self
            .questions
            .get_by_id(id)
            .await
            .context("Failed to load question")?
            .ok_or_else(|| QuestionServiceError::NotFound(id.to_string()))?;

        if existing.author_id != requesting_user_id {
            tracing::warn!(
                "User {} attempted to edit question {} owned by {}",
                requesting_user_id,
                id,
                existing.author_id
            );
            return Err(QuestionServiceError::Forbidden(
                "Only the author can edit this question".to_string(),
            ));
        }

        let input = validation::validate_edit_question(input)?;

        let mut uow = self.begin().await?;
        let outcome = tokio::time::timeout(
            self.transaction_timeout,
            self.questions
                .update(&mut uow, id, &input.title, &input.content),
        )
        .await
        .unwrap_or_else(|_| Err(self.timeout_error()));

        match outcome {
            Ok(Some(question)) => {
                self.commit(uow).await?;
                tracing::info!("Edited question {}", id);
                Ok(question)
            }
            Ok(None) => {
                rollback(uow).await;
                Err(QuestionServiceError::NotFound(id.to_string()))
            }
            Err(e) => {
                rollback(uow).await;
                Err(classify(e))
            }
        }
    }

    /// Get a question together with its tags, in the order they were attached
    pub async fn get_question(&self, id: i64) -> Result<QuestionDetail, QuestionServiceError> {
        let question = self
            .questions
            .get_by_id(id)
            .await
            .context("Failed to load question")?
            .ok_or_else(|| QuestionServiceError::NotFound(id.to_string()))?;

        let mut tags = self
            .tags
            .get_by_question_id(id)
            .await
            .context("Failed to load question tags")?;
        tags.sort_by_key(|tag| {
            question
                .tag_ids
                .iter()
                .position(|id| *id == tag.id)
                .unwrap_or(usize::MAX)
        });

        Ok(QuestionDetail { question, tags })
    }

    async fn begin(&self) -> Result<UnitOfWork, QuestionServiceError> {
        let pool = self
            .connections
            .acquire()
            .await
            .map_err(|e| QuestionServiceError::Internal(e.into()))?;
        let uow = pool.begin().await?;
        Ok(uow)
    }

    async fn commit(&self, uow: UnitOfWork) -> Result<(), QuestionServiceError> {
        uow.commit().await.map_err(|e| {
            tracing::warn!("Commit failed: {:#}", e);
            QuestionServiceError::TransactionAborted(e)
        })
    }

    fn timeout_error(&self) -> anyhow::Error {
        anyhow!(
            "Transaction exceeded timeout of {:?}",
            self.transaction_timeout
        )
    }
}

async fn rollback(uow: UnitOfWork) {
    if let Err(e) = uow.rollback().await {
        tracing::warn!("Rollback failed: {:#}", e);
    }
}

/// Map a failure inside the transaction to the service error
fn classify(err: anyhow::Error) -> QuestionServiceError {
    if let Some(dup) = err.downcast_ref::<DuplicateLinkError>() {
        tracing::error!(
            "Duplicate link for question {} and tag {}; transaction rolled back",
            dup.question_id,
            dup.tag_id
        );
        return QuestionServiceError::DuplicateLink {
            question_id: dup.question_id,
            tag_id: dup.tag_id,
        };
    }
    tracing::warn!("Transaction rolled back: {:#}", err);
    QuestionServiceError::TransactionAborted(err)
}
