use sqlx::PgPool;

use crate::models::conversation::ConversationRow;

pub async fn insert(
    pool: &PgPool,
    title: &str,
    description: Option<&str>,
    project_id: i32,
    user_id: i32,
) -> Result<ConversationRow, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO conversations
            (conversation_title, conversation_description, conversation_project_id, conversation_user_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(project_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(
    pool: &PgPool,
    conversation_id: i32,
) -> Result<Option<ConversationRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM conversations WHERE conversation_id = $1")
        .bind(conversation_id)
        .fetch_optional(pool)
        .await
}

/// Lists a user's conversations, newest first, optionally within one project.
pub async fn list_by_user(
    pool: &PgPool,
    user_id: i32,
    project_id: Option<i32>,
    offset: i64,
    limit: i64,
) -> Result<Vec<ConversationRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT * FROM conversations
        WHERE conversation_user_id = $1
          AND ($2::INTEGER IS NULL OR conversation_project_id = $2)
        ORDER BY created_at DESC, conversation_id DESC
        OFFSET $3 LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(project_id)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    conversation_id: i32,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<Option<ConversationRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE conversations SET
            conversation_title       = COALESCE($2, conversation_title),
            conversation_description = COALESCE($3, conversation_description),
            updated_at               = NOW()
        WHERE conversation_id = $1
        RETURNING *
        "#,
    )
    .bind(conversation_id)
    .bind(title)
    .bind(description)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, conversation_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM conversations WHERE conversation_id = $1")
        .bind(conversation_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
