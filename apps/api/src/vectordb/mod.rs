//! Vector collections. Each project owns one table named
//! `collection_<embedding_size>_<project_id>`, written by the embedding
//! pipeline. This service only ever removes data from them.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("vector store query failed: {0}")]
    Query(#[from] sqlx::Error),
}

impl From<StoreError> for crate::errors::AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Query(e) => crate::errors::AppError::Database(e),
        }
    }
}

/// Carried in `AppState` as `Arc<dyn VectorStore>`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drops the whole collection of a project. A missing collection is not an error.
    async fn delete_collection(&self, project_id: i32) -> Result<(), StoreError>;

    /// Removes the vectors built from the given chunks.
    async fn delete_vectors(&self, project_id: i32, chunk_ids: &[i32]) -> Result<(), StoreError>;
}

pub fn collection_name(embedding_size: u32, project_id: i32) -> String {
    format!("collection_{embedding_size}_{project_id}")
}

/// pgvector collections living in the application database.
pub struct PgVectorStore {
    pool: PgPool,
    embedding_size: u32,
}

impl PgVectorStore {
    pub fn new(pool: PgPool, embedding_size: u32) -> Self {
        Self {
            pool,
            embedding_size,
        }
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn delete_collection(&self, project_id: i32) -> Result<(), StoreError> {
        let name = collection_name(self.embedding_size, project_id);
        // Identifiers cannot be bound; the name only ever holds integers.
        sqlx::query(&format!("DROP TABLE IF EXISTS {name}"))
            .execute(&self.pool)
            .await?;
        info!("Dropped vector collection {name}");
        Ok(())
    }

    async fn delete_vectors(&self, project_id: i32, chunk_ids: &[i32]) -> Result<(), StoreError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }
        let name = collection_name(self.embedding_size, project_id);
        if !self.collection_exists(&name).await? {
            debug!("Vector collection {name} does not exist, nothing to delete");
            return Ok(());
        }
        let result = sqlx::query(&format!("DELETE FROM {name} WHERE chunk_id = ANY($1)"))
            .bind(chunk_ids)
            .execute(&self.pool)
            .await?;
        debug!(
            "Deleted {} vectors from {name}",
            result.rows_affected()
        );
        Ok(())
    }
}
