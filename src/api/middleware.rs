//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope returned by every handler
//! - Authentication: the fronting gateway verifies the user and forwards
//!   their id in `X-User-Id`; this layer only checks that it is present
//!   and well-formed.

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::ConnectionManager;
use crate::services::{QuestionService, QuestionServiceError, TagService, TagServiceError};

/// Header carrying the verified user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionManager>,
    pub question_service: Arc<QuestionService>,
    pub tag_service: Arc<TagService>,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn transaction_aborted(message: impl Into<String>) -> Self {
        Self::new("TRANSACTION_ABORTED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "TRANSACTION_ABORTED" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<QuestionServiceError> for ApiError {
    fn from(err: QuestionServiceError) -> Self {
        match err {
            QuestionServiceError::Validation(msg) => ApiError::validation_error(msg),
            QuestionServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            QuestionServiceError::NotFound(id) => {
                ApiError::not_found(format!("Question not found: {}", id))
            }
            QuestionServiceError::TransactionAborted(e) => {
                tracing::warn!("Question write aborted: {:#}", e);
                ApiError::transaction_aborted("The question could not be saved, please retry")
            }
            QuestionServiceError::DuplicateLink {
                question_id,
                tag_id,
            } => ApiError::with_details(
                "INTERNAL_ERROR",
                "Duplicate question tag link",
                serde_json::json!({ "question_id": question_id, "tag_id": tag_id }),
            ),
            QuestionServiceError::Internal(e) => {
                tracing::error!("Question service error: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(id) => ApiError::not_found(format!("Tag not found: {}", id)),
            TagServiceError::InternalError(e) => {
                tracing::error!("Tag service error: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Read the verified user id forwarded by the gateway
fn extract_user_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
}

/// Authentication middleware
pub async fn require_auth(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let user_id = extract_user_id(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing or invalid user identity"))?;

    tracing::debug!("Authenticated user {}", user_id);
    request.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
