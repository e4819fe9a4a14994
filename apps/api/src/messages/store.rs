use sqlx::PgPool;

use crate::models::message::MessageRow;

pub async fn insert(
    pool: &PgPool,
    content: &str,
    sender: Option<&str>,
    conversation_id: i32,
    user_id: i32,
) -> Result<MessageRow, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO messages
            (message_content, message_sender, message_conversation_id, message_user_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(content)
    .bind(sender)
    .bind(conversation_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, message_id: i32) -> Result<Option<MessageRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM messages WHERE message_id = $1")
        .bind(message_id)
        .fetch_optional(pool)
        .await
}

/// Messages of one author in chronological order, optionally within one
/// conversation.
pub async fn list_by_user(
    pool: &PgPool,
    user_id: i32,
    conversation_id: Option<i32>,
    offset: i64,
    limit: i64,
) -> Result<Vec<MessageRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT * FROM messages
        WHERE message_user_id = $1
          AND ($2::INTEGER IS NULL OR message_conversation_id = $2)
        ORDER BY created_at, message_id
        OFFSET $3 LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(conversation_id)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    message_id: i32,
    content: Option<&str>,
    sender: Option<&str>,
) -> Result<Option<MessageRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE messages SET
            message_content = COALESCE($2, message_content),
            message_sender  = COALESCE($3, message_sender),
            updated_at      = NOW()
        WHERE message_id = $1
        RETURNING *
        "#,
    )
    .bind(message_id)
    .bind(content)
    .bind(sender)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, message_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM messages WHERE message_id = $1")
        .bind(message_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
