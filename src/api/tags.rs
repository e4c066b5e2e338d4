//! Tag API endpoints
//!
//! - GET /api/v1/tags - Paginated tag directory
//! - GET /api/v1/tags/{id} - Single tag
//! - GET /api/v1/tags/by-name/{name} - Single tag by name, ignoring case

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{ListParams, Tag, TagFilter, TagListParams};

/// Query parameters for the tag list
#[derive(Debug, Deserialize)]
pub struct ListTagsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Case-insensitive name search
    pub query: Option<String>,
    /// popular, recent, oldest or name
    pub filter: Option<String>,
}

fn default_page() -> u32 { 1 }
fn default_page_size() -> u32 { 20 }

impl From<ListTagsQuery> for TagListParams {
    fn from(query: ListTagsQuery) -> Self {
        Self {
            page: ListParams::new(query.page, query.page_size),
            query: query.query,
            filter: query
                .filter
                .as_deref()
                .map(TagFilter::parse)
                .unwrap_or_default(),
        }
    }
}

/// Response for tag list
#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<TagResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub is_next: bool,
}

/// Response for a single tag
#[derive(Debug, Serialize)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
    pub question_count: i64,
    pub created_at: String,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            question_count: tag.question_count,
            created_at: tag.created_at.to_rfc3339(),
        }
    }
}

/// Build the tags router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/{id}", get(get_tag))
        .route("/by-name/{name}", get(get_tag_by_name))
}

/// GET /api/v1/tags - List tags
async fn list_tags(
    State(state): State<AppState>,
    Query(query): Query<ListTagsQuery>,
) -> Result<Json<TagListResponse>, ApiError> {
    let params = TagListParams::from(query);
    let result = state.tag_service.list(&params).await?;

    let total_pages = result.total_pages();
    let is_next = result.has_next();
    Ok(Json(TagListResponse {
        total: result.total,
        page: result.page,
        page_size: result.per_page,
        total_pages,
        is_next,
        tags: result.items.into_iter().map(TagResponse::from).collect(),
    }))
}

/// GET /api/v1/tags/{id} - Get a tag
async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TagResponse>, ApiError> {
    let tag = state.tag_service.get_by_id(id).await?;
    Ok(Json(tag.into()))
}

/// GET /api/v1/tags/by-name/{name} - Get a tag by name
async fn get_tag_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TagResponse>, ApiError> {
    let tag = state.tag_service.get_by_name(&name).await?;
    Ok(Json(tag.into()))
}
