use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::user::{UserRole, UserRow};

pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: UserRole,
    pub email_verified: bool,
    pub verification_token: Option<&'a str>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
}

pub async fn insert(pool: &PgPool, user: NewUser<'_>) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO users
            (first_name, last_name, email, password_hash, user_role,
             email_verified, email_verification_token)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.role.as_str())
    .bind(user.email_verified)
    .bind(user.verification_token)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, user_id: i32) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Emails are compared case-insensitively.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_verification_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE email_verification_token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_reset_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE password_reset_token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool, offset: i64, limit: i64) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users ORDER BY user_id OFFSET $1 LIMIT $2")
        .bind(offset)
        .bind(limit)
        .fetch_all(pool)
        .await
}

pub async fn update(
    pool: &PgPool,
    user_id: i32,
    changes: UserChanges,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE users SET
            first_name    = COALESCE($2, first_name),
            last_name     = COALESCE($3, last_name),
            email         = COALESCE($4, email),
            password_hash = COALESCE($5, password_hash),
            user_role     = COALESCE($6, user_role),
            updated_at    = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(changes.first_name)
    .bind(changes.last_name)
    .bind(changes.email)
    .bind(changes.password_hash)
    .bind(changes.role.map(|r| r.as_str()))
    .fetch_optional(pool)
    .await
}

pub async fn mark_verified(pool: &PgPool, user_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET email_verified = TRUE, email_verification_token = NULL, \
         updated_at = NOW() WHERE user_id = $1",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_verification_token(
    pool: &PgPool,
    user_id: i32,
    token: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET email_verification_token = $2, updated_at = NOW() WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(token)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_reset_token(
    pool: &PgPool,
    user_id: i32,
    token: &str,
    expires: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET password_reset_token = $2, password_reset_expires = $3, \
         updated_at = NOW() WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(token)
    .bind(expires)
    .execute(pool)
    .await?;
    Ok(())
}

/// Stores the new hash and consumes the reset token.
pub async fn reset_password(
    pool: &PgPool,
    user_id: i32,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET password_hash = $2, password_reset_token = NULL, \
         password_reset_expires = NULL, updated_at = NOW() WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(password_hash)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, user_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn admin_exists(pool: &PgPool) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE user_role = 'ADMIN')")
        .fetch_one(pool)
        .await
}

/// Postgres unique-violation on `users.email`.
pub fn is_duplicate_email(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
