//! Tag service
//!
//! Read-side operations for tags: the paginated tag directory and single
//! lookups. Tags are only ever created or counted through
//! `QuestionService::create_question`.

use crate::db::repositories::TagRepository;
use crate::models::{PagedResult, Tag, TagListParams};
use anyhow::Context;
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Tag not found
    #[error("Tag not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0:#}")]
    InternalError(#[from] anyhow::Error),
}

/// Tag service for browsing tags
pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    /// Create a new tag service
    ///
    /// # Arguments
    /// * `repo` - Tag repository for database operations
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    /// List tags
    ///
    /// Supports case-insensitive name search and the `popular`, `recent`,
    /// `oldest` and `name` orderings.
    pub async fn list(&self, params: &TagListParams) -> Result<PagedResult<Tag>, TagServiceError> {
        self.repo
            .list(params)
            .await
            .context("Failed to list tags")
            .map_err(Into::into)
    }

    /// Get tag by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get tag by ID")?
            .ok_or_else(|| TagServiceError::NotFound(id.to_string()))
    }

    /// Get tag by name, ignoring case
    pub async fn get_by_name(&self, name: &str) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_name(name.trim())
            .await
            .context("Failed to get tag by name")?
            .ok_or_else(|| TagServiceError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxTagRepository;
    use crate::db::{create_test_pool, migrations, ConnectionManager};
    use crate::models::{ListParams, TagFilter};

    async fn setup() -> (Arc<ConnectionManager>, TagService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let connections = Arc::new(ConnectionManager::with_pool(pool));
        let service = TagService::new(SqlxTagRepository::boxed(connections.clone()));
        (connections, service)
    }

    async fn seed(connections: &Arc<ConnectionManager>, names: &[&str]) {
        let repo = SqlxTagRepository::new(connections.clone());
        let pool = connections.acquire().await.unwrap();
        let mut uow = pool.begin().await.unwrap();
        for name in names {
            repo.find_or_create(&mut uow, name).await.unwrap();
        }
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_list_empty() {
        let (_connections, service) = setup().await;

        let page = service
            .list(&TagListParams::default())
            .await
            .expect("Failed to list tags");

        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn test_list_popular_first() {
        let (connections, service) = setup().await;
        seed(&connections, &["rare", "common", "Common", "COMMON"]).await;

        let page = service.list(&TagListParams::default()).await.unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "common");
        assert_eq!(page.items[0].question_count, 3);
        assert_eq!(page.items[1].name, "rare");
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let (connections, service) = setup().await;
        seed(&connections, &["a1", "a2", "a3", "a4", "a5"]).await;

        let params = TagListParams {
            page: ListParams::new(1, 2),
            filter: TagFilter::Oldest,
            query: None,
        };
        let page = service.list(&params).await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
    }

    #[tokio::test]
    async fn test_get_by_id_and_name() {
        let (connections, service) = setup().await;
        seed(&connections, &["Kotlin"]).await;

        let tag = service.get_by_name(" kotlin ").await.expect("Tag should exist");
        assert_eq!(tag.name, "Kotlin");

        let same = service.get_by_id(tag.id).await.unwrap();
        assert_eq!(same.id, tag.id);

        let err = service.get_by_id(9999).await.unwrap_err();
        assert!(matches!(err, TagServiceError::NotFound(_)));
    }
}
