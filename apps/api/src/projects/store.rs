use sqlx::PgPool;

use crate::models::project::ProjectRow;

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct ProjectChanges {
    pub nom_projet: Option<String>,
    pub description_projet: Option<String>,
    pub visibility: Option<&'static str>,
}

pub async fn insert(
    pool: &PgPool,
    user_id: i32,
    nom_projet: &str,
    description_projet: Option<&str>,
    visibility: &str,
) -> Result<ProjectRow, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO projects (nom_projet, description_projet, visibility, user_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(nom_projet)
    .bind(description_projet)
    .bind(visibility)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Highest id the project sequence has handed out, 0 before the first insert.
pub async fn last_allocated_id(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(pg_sequence_last_value(\
         pg_get_serial_sequence('projects', 'project_id')::regclass), 0)",
    )
    .fetch_one(pool)
    .await
}

/// Inserts a bare project under an id the sequence already handed out, and
/// returns whichever row holds that id afterwards. The sequence is left alone.
pub async fn insert_with_id(
    pool: &PgPool,
    project_id: i32,
    user_id: i32,
) -> Result<ProjectRow, sqlx::Error> {
    sqlx::query(
        "INSERT INTO projects (project_id, user_id) VALUES ($1, $2) \
         ON CONFLICT (project_id) DO NOTHING",
    )
    .bind(project_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    sqlx::query_as("SELECT * FROM projects WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, project_id: i32) -> Result<Option<ProjectRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM projects WHERE project_id = $1")
        .bind(project_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_all(pool: &PgPool, offset: i64, limit: i64) -> Result<Vec<ProjectRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM projects ORDER BY project_id OFFSET $1 LIMIT $2")
        .bind(offset)
        .bind(limit)
        .fetch_all(pool)
        .await
}

pub async fn list_public(
    pool: &PgPool,
    offset: i64,
    limit: i64,
) -> Result<(Vec<ProjectRow>, i64), sqlx::Error> {
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE visibility = 'public'")
            .fetch_one(pool)
            .await?;
    let projects = sqlx::query_as(
        "SELECT * FROM projects WHERE visibility = 'public' \
         ORDER BY created_at DESC, project_id DESC OFFSET $1 LIMIT $2",
    )
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok((projects, total))
}

pub async fn list_by_user(
    pool: &PgPool,
    user_id: i32,
    offset: i64,
    limit: i64,
) -> Result<(Vec<ProjectRow>, i64), sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    let projects = sqlx::query_as(
        "SELECT * FROM projects WHERE user_id = $1 \
         ORDER BY created_at DESC, project_id DESC OFFSET $2 LIMIT $3",
    )
    .bind(user_id)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok((projects, total))
}

pub async fn ids_owned_by(pool: &PgPool, user_id: i32) -> Result<Vec<i32>, sqlx::Error> {
    sqlx::query_scalar("SELECT project_id FROM projects WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn update(
    pool: &PgPool,
    project_id: i32,
    changes: ProjectChanges,
) -> Result<Option<ProjectRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE projects SET
            nom_projet         = COALESCE($2, nom_projet),
            description_projet = COALESCE($3, description_projet),
            visibility         = COALESCE($4, visibility),
            updated_at         = NOW()
        WHERE project_id = $1
        RETURNING *
        "#,
    )
    .bind(project_id)
    .bind(changes.nom_projet)
    .bind(changes.description_projet)
    .bind(changes.visibility)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, project_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM projects WHERE project_id = $1")
        .bind(project_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
