use serde_json::Value;
use sqlx::PgPool;

use crate::models::asset::{AssetRow, ASSET_TYPE_FILE};
use crate::models::chunk::NewChunk;

pub async fn insert_asset(
    pool: &PgPool,
    project_id: i32,
    asset_name: &str,
    asset_size: i64,
    asset_config: Option<Value>,
) -> Result<AssetRow, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO assets (asset_type, asset_name, asset_size, asset_config, asset_project_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(ASSET_TYPE_FILE)
    .bind(asset_name)
    .bind(asset_size)
    .bind(asset_config)
    .bind(project_id)
    .fetch_one(pool)
    .await
}

pub async fn find_asset(
    pool: &PgPool,
    project_id: i32,
    asset_name: &str,
) -> Result<Option<AssetRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM assets WHERE asset_project_id = $1 AND asset_name = $2")
        .bind(project_id)
        .bind(asset_name)
        .fetch_optional(pool)
        .await
}

pub async fn list_file_assets(pool: &PgPool, project_id: i32) -> Result<Vec<AssetRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM assets WHERE asset_project_id = $1 AND asset_type = $2 ORDER BY asset_id",
    )
    .bind(project_id)
    .bind(ASSET_TYPE_FILE)
    .fetch_all(pool)
    .await
}

pub async fn delete_asset(pool: &PgPool, asset_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM assets WHERE asset_id = $1")
        .bind(asset_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Inserts all chunks of one file in a single transaction.
pub async fn insert_chunks(pool: &PgPool, chunks: &[NewChunk]) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    for chunk in chunks {
        sqlx::query(
            r#"
            INSERT INTO chunks
                (chunk_text, chunk_metadata, chunk_order, chunk_project_id, chunk_asset_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&chunk.text)
        .bind(&chunk.metadata)
        .bind(chunk.order)
        .bind(chunk.project_id)
        .bind(chunk.asset_id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(chunks.len() as u64)
}

pub async fn delete_project_chunks(pool: &PgPool, project_id: i32) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM chunks WHERE chunk_project_id = $1")
        .bind(project_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn chunk_ids_for_asset(pool: &PgPool, asset_id: i32) -> Result<Vec<i32>, sqlx::Error> {
    sqlx::query_scalar("SELECT chunk_id FROM chunks WHERE chunk_asset_id = $1")
        .bind(asset_id)
        .fetch_all(pool)
        .await
}

pub async fn delete_asset_chunks(pool: &PgPool, asset_id: i32) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM chunks WHERE chunk_asset_id = $1")
        .bind(asset_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
