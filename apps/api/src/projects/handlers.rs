use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{AdminUser, AuthUser};
use crate::data;
use crate::errors::AppError;
use crate::extractors::{AppJson, AppPath, AppQuery};
use crate::models::project::{ProjectRow, VISIBILITY_PRIVATE, VISIBILITY_PUBLIC};
use crate::pagination::PageQuery;
use crate::projects::store::{self, ProjectChanges};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub nom_projet: Option<String>,
    pub description_projet: Option<String>,
    pub visibility: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub nom_projet: Option<String>,
    pub description_projet: Option<String>,
    pub visibility: Option<String>,
}

/// Maps a requested visibility to a stored one. Unknown values become
/// `private`; `public` is reserved to admins.
fn resolve_visibility(caller: &AuthUser, requested: Option<&str>) -> Result<&'static str, AppError> {
    match requested.map(str::trim) {
        Some(VISIBILITY_PUBLIC) if !caller.is_admin() => Err(AppError::detailed(
            StatusCode::FORBIDDEN,
            "forbidden",
            "Only administrators can create public projects",
        )),
        Some(VISIBILITY_PUBLIC) => Ok(VISIBILITY_PUBLIC),
        _ => Ok(VISIBILITY_PRIVATE),
    }
}

/// Loads a project the caller owns. Admins get no bypass here: only owners
/// may modify or delete a project.
async fn owned_project(
    state: &AppState,
    caller: &AuthUser,
    project_id: i32,
) -> Result<ProjectRow, AppError> {
    let project = store::find_by_id(&state.db, project_id)
        .await?
        .ok_or_else(|| {
            AppError::detailed(StatusCode::NOT_FOUND, "project_not_found", "Project not found")
        })?;
    if project.user_id != caller.user_id {
        return Err(AppError::Forbidden("forbidden"));
    }
    Ok(project)
}

// ─── Admin ───────────────────────────────────────────────────────────────────

/// GET /api/v1/projects?page=&page_size=
pub async fn handle_list_all_projects(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Vec<ProjectRow>>, AppError> {
    let page = query.resolve(DEFAULT_PAGE_SIZE);
    Ok(Json(
        store::list_all(&state.db, page.offset(), page.limit()).await?,
    ))
}

// ─── Personal projects ───────────────────────────────────────────────────────

/// GET /api/v1/personal-projects/public
pub async fn handle_list_public_projects(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let page = query.resolve(DEFAULT_PAGE_SIZE);
    let (projects, total) = store::list_public(&state.db, page.offset(), page.limit()).await?;
    Ok(Json(json!({
        "signal": "public_projects_list_success",
        "projects": projects,
        "total_projects": total,
        "total_pages": page.total_pages(total),
        "page": page.page,
        "page_size": page.page_size,
    })))
}

/// POST /api/v1/personal-projects
pub async fn handle_create_project(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(req): AppJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let name = req
        .nom_projet
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            AppError::detailed(
                StatusCode::BAD_REQUEST,
                "project_creation_error",
                "Project name is required",
            )
        })?;
    let visibility = resolve_visibility(&caller, req.visibility.as_deref())?;

    let project = store::insert(
        &state.db,
        caller.user_id,
        name,
        req.description_projet.as_deref(),
        visibility,
    )
    .await?;
    info!(
        "User {} created {visibility} project {}",
        caller.user_id, project.project_id
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "signal": "project_created_success", "project": project })),
    ))
}

/// GET /api/v1/personal-projects
pub async fn handle_list_my_projects(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let page = query.resolve(DEFAULT_PAGE_SIZE);
    let (projects, total) =
        store::list_by_user(&state.db, caller.user_id, page.offset(), page.limit()).await?;
    Ok(Json(json!({
        "signal": "projects_list_success",
        "projects": projects,
        "total_projects": total,
        "total_pages": page.total_pages(total),
    })))
}

/// GET /api/v1/personal-projects/:id
///
/// Public projects are readable by every authenticated user.
pub async fn handle_get_project(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(project_id): AppPath<i32>,
) -> Result<Json<Value>, AppError> {
    let project = store::find_by_id(&state.db, project_id)
        .await?
        .ok_or_else(|| {
            AppError::detailed(StatusCode::NOT_FOUND, "project_not_found", "Project not found")
        })?;
    if !project.is_public() && project.user_id != caller.user_id {
        return Err(AppError::Forbidden("forbidden"));
    }
    Ok(Json(json!({ "signal": "project_found_success", "project": project })))
}

/// PUT /api/v1/personal-projects/:id
pub async fn handle_update_project(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(project_id): AppPath<i32>,
    AppJson(req): AppJson<UpdateProjectRequest>,
) -> Result<Json<Value>, AppError> {
    owned_project(&state, &caller, project_id).await?;

    let visibility = match req.visibility.as_deref() {
        Some(requested) => Some(resolve_visibility(&caller, Some(requested))?),
        None => None,
    };
    let nom_projet = match req.nom_projet.as_deref().map(str::trim) {
        Some("") => {
            return Err(AppError::detailed(
                StatusCode::BAD_REQUEST,
                "project_update_error",
                "Project name cannot be empty",
            ))
        }
        Some(name) => Some(name.to_string()),
        None => None,
    };

    let project = store::update(
        &state.db,
        project_id,
        ProjectChanges {
            nom_projet,
            description_projet: req.description_projet,
            visibility,
        },
    )
    .await?
    .ok_or(AppError::NotFound("project_not_found"))?;

    Ok(Json(json!({ "signal": "project_updated_success", "project": project })))
}

/// DELETE /api/v1/personal-projects/:id
pub async fn handle_delete_project(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(project_id): AppPath<i32>,
) -> Result<Json<Value>, AppError> {
    owned_project(&state, &caller, project_id).await?;

    data::purge_project_artifacts(&state, project_id).await?;
    store::delete(&state.db, project_id).await?;
    info!("User {} deleted project {project_id}", caller.user_id);

    Ok(Json(json!({
        "signal": "project_deleted_success",
        "message": "Project deleted successfully",
    })))
}
