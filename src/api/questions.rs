//! Question API endpoints
//!
//! - POST /api/v1/questions - Ask a question (auth)
//! - GET  /api/v1/questions/{id} - Get a question with its tags
//! - PUT  /api/v1/questions/{id} - Edit title and content (auth, author only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{self, ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateQuestionInput, EditQuestionInput, Question, QuestionDetail, Tag};

/// Request body for asking a question
#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for editing a question
#[derive(Debug, Deserialize)]
pub struct EditQuestionRequest {
    pub title: String,
    pub content: String,
}

/// Response for a single question
#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub tag_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagSummary>>,
    pub created_at: String,
    pub updated_at: String,
}

/// Tag as embedded in a question response
#[derive(Debug, Serialize)]
pub struct TagSummary {
    pub id: i64,
    pub name: String,
}

impl From<Tag> for TagSummary {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
        }
    }
}

impl From<Question> for QuestionResponse {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            title: question.title,
            content: question.content,
            author_id: question.author_id,
            tag_ids: question.tag_ids,
            tags: None,
            created_at: question.created_at.to_rfc3339(),
            updated_at: question.updated_at.to_rfc3339(),
        }
    }
}

impl From<QuestionDetail> for QuestionResponse {
    fn from(detail: QuestionDetail) -> Self {
        let mut response = QuestionResponse::from(detail.question);
        response.tags = Some(detail.tags.into_iter().map(TagSummary::from).collect());
        response
    }
}

/// Build the questions router
///
/// Writes sit behind `require_auth`; reading a question is public.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(create_question).route_layer(axum_middleware::from_fn(middleware::require_auth)),
        )
        .route(
            "/{id}",
            put(edit_question)
                .route_layer(axum_middleware::from_fn(middleware::require_auth))
                .get(get_question),
        )
}

/// POST /api/v1/questions - Ask a question
pub async fn create_question(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    let input = CreateQuestionInput::new(body.title, body.content, body.tags, user.0);
    let question = state.question_service.create_question(input).await?;

    Ok((StatusCode::CREATED, Json(question.into())))
}

/// GET /api/v1/questions/{id} - Get a question with its tags
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let detail = state.question_service.get_question(id).await?;
    Ok(Json(detail.into()))
}

/// PUT /api/v1/questions/{id} - Edit a question
pub async fn edit_question(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<EditQuestionRequest>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let input = EditQuestionInput {
        title: body.title,
        content: body.content,
    };
    let question = state
        .question_service
        .edit_question(id, input, user.0)
        .await?;

    Ok(Json(question.into()))
}
