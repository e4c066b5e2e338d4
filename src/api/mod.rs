//! API layer - HTTP handlers and routing
//!
//! This module contains the HTTP API of the DevFlow question service.
//! It includes:
//! - Question API endpoints
//! - Tag API endpoints
//! - Health check

pub mod middleware;
pub mod questions;
pub mod tags;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/questions", questions::router())
        .nest("/tags", tags::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(middleware::USER_ID_HEADER),
        ]);
    let cors = match cors_origin.parse::<HeaderValue>() {
        Ok(origin) if cors_origin != "*" => cors.allow_origin(origin),
        _ => cors.allow_origin(Any),
    };

    Router::new()
        .nest("/api/v1", build_api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /api/v1/health - Database reachability
async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let pool = state.connections.acquire().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::internal_error("Database unavailable")
    })?;
    pool.ping().await.map_err(|e| {
        tracing::error!("Health check failed: {:#}", e);
        ApiError::internal_error("Database unavailable")
    })?;

    Ok(Json(json!({ "status": "ok", "database": pool.driver() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxQuestionRepository, SqlxTagQuestionRepository, SqlxTagRepository,
    };
    use crate::db::{create_test_pool, migrations, ConnectionManager};
    use crate::services::{QuestionService, TagService};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let connections = Arc::new(ConnectionManager::with_pool(pool));

        let tag_repo = SqlxTagRepository::boxed(connections.clone());
        let question_service = Arc::new(QuestionService::new(
            connections.clone(),
            SqlxQuestionRepository::boxed(connections.clone()),
            tag_repo.clone(),
            SqlxTagQuestionRepository::boxed(connections.clone()),
        ));
        let state = AppState {
            connections,
            question_service,
            tag_service: Arc::new(TagService::new(tag_repo)),
        };
        build_router(state, "http://localhost:3000")
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("Request failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Body should be JSON")
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, user_id: Option<i64>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(id) = user_id {
            builder = builder.header(middleware::USER_ID_HEADER, id.to_string());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_question() {
        let app = test_app().await;

        let (status, created) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/questions",
                Some(3),
                json!({ "title": "How do I use axum?", "content": "Details", "tags": ["Rust", "rust", "axum"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["author_id"], 3);
        assert_eq!(created["tag_ids"].as_array().unwrap().len(), 2);

        let id = created["id"].as_i64().unwrap();
        let (status, fetched) = send(&app, get_request(&format!("/api/v1/questions/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "How do I use axum?");
        let names: Vec<_> = fetched["tags"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Rust", "axum"]);
    }

    #[tokio::test]
    async fn test_create_requires_user() {
        let app = test_app().await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/questions",
                None,
                json!({ "title": "Anonymous question", "content": "Body", "tags": ["x"] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_create_validation_error() {
        let app = test_app().await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/questions",
                Some(1),
                json!({ "title": "Short", "content": "Body", "tags": [] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_edit_permissions() {
        let app = test_app().await;
        let (_, created) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/questions",
                Some(1),
                json!({ "title": "Owned question", "content": "Body", "tags": ["go"] }),
            ),
        )
        .await;
        let uri = format!("/api/v1/questions/{}", created["id"]);
        let edit = json!({ "title": "Edited question", "content": "New body" });

        let (status, body) = send(&app, json_request("PUT", &uri, Some(2), edit.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (status, body) = send(&app, json_request("PUT", &uri, Some(1), edit)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Edited question");
    }

    #[tokio::test]
    async fn test_missing_question_is_404() {
        let app = test_app().await;

        let (status, body) = send(&app, get_request("/api/v1/questions/12345")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_tags() {
        let app = test_app().await;
        for (title, tags) in [
            ("First question", json!(["Go", "rust"])),
            ("Second question", json!(["go"])),
        ] {
            send(
                &app,
                json_request(
                    "POST",
                    "/api/v1/questions",
                    Some(1),
                    json!({ "title": title, "content": "Body", "tags": tags }),
                ),
            )
            .await;
        }

        let (status, body) = send(&app, get_request("/api/v1/tags?filter=popular")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["tags"][0]["name"], "Go");
        assert_eq!(body["tags"][0]["question_count"], 2);

        let (_, body) = send(&app, get_request("/api/v1/tags?query=RUS")).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["tags"][0]["name"], "rust");
    }

    #[tokio::test]
    async fn test_get_tag_by_name() {
        let app = test_app().await;
        send(
            &app,
            json_request(
                "POST",
                "/api/v1/questions",
                Some(1),
                json!({ "title": "Pattern matching", "content": "Body", "tags": ["Haskell"] }),
            ),
        )
        .await;

        let (status, body) = send(&app, get_request("/api/v1/tags/by-name/HASKELL")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Haskell");
        assert_eq!(body["question_count"], 1);

        let (status, body) = send(&app, get_request("/api/v1/tags/by-name/elm")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;

        let (status, body) = send(&app, get_request("/api/v1/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
