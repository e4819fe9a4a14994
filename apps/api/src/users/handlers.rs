use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::password::hash_password;
use crate::auth::{validate_email, AdminUser, AuthUser};
use crate::data;
use crate::errors::AppError;
use crate::extractors::{AppJson, AppPath, AppQuery};
use crate::models::user::{UserRole, UserView};
use crate::pagination::PageQuery;
use crate::projects::store as project_store;
use crate::state::AppState;
use crate::users::store::{self, NewUser, UserChanges};

const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: Option<String>,
    pub user_role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user_id: i32,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub user_role: Option<String>,
}

/// An address belongs to at most one account, whatever its case.
fn check_email_free(holder: Option<i32>, user_id: i32) -> Result<(), AppError> {
    match holder {
        Some(other) if other != user_id => Err(AppError::BadRequest("email_already_exists")),
        _ => Ok(()),
    }
}

fn parse_role(raw: &str) -> Result<UserRole, AppError> {
    raw.parse().map_err(|_| AppError::BadRequest("invalid_user_role"))
}

/// POST /api/v1/users
pub async fn handle_create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(req): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    let role = req
        .user_role
        .as_deref()
        .map(parse_role)
        .transpose()?
        .unwrap_or(UserRole::User);

    let password = req
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or(AppError::BadRequest("password_required"))?;

    let email = req.email.trim();
    validate_email(email)?;
    if store::find_by_email(&state.db, email).await?.is_some() {
        return Err(AppError::BadRequest("email_already_exists"));
    }

    let password_hash = hash_password(password).await?;
    let user = store::insert(
        &state.db,
        NewUser {
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            email,
            password_hash: &password_hash,
            role,
            email_verified: true,
            verification_token: None,
        },
    )
    .await
    .map_err(|e| {
        if store::is_duplicate_email(&e) {
            AppError::BadRequest("email_already_exists")
        } else {
            AppError::Database(e)
        }
    })?;

    info!(
        "Admin {} created user {} with role {role}",
        admin.user_id, user.user_id
    );
    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user_id: user.user_id,
            email: user.email,
        }),
    ))
}

/// GET /api/v1/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(user_id): AppPath<i32>,
) -> Result<Json<UserView>, AppError> {
    if !caller.can_act_on(user_id) {
        return Err(AppError::Forbidden("forbidden"));
    }
    let user = store::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::NotFound("user_not_found"))?;
    Ok(Json(user.into()))
}

/// GET /api/v1/users?page=&page_size=
pub async fn handle_list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Vec<UserView>>, AppError> {
    let page = query.resolve(DEFAULT_PAGE_SIZE);
    let users = store::list(&state.db, page.offset(), page.limit()).await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

/// PUT /api/v1/users/:id
pub async fn handle_update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(user_id): AppPath<i32>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    if !caller.can_act_on(user_id) {
        return Err(AppError::Forbidden("forbidden"));
    }

    let role = match req.user_role.as_deref() {
        Some(_) if !caller.is_admin() => return Err(AppError::Forbidden("forbidden")),
        Some(raw) => Some(parse_role(raw)?),
        None => None,
    };

    let email = match req.email.as_deref().map(str::trim) {
        Some(email) => {
            validate_email(email)?;
            let holder = store::find_by_email(&state.db, email).await?;
            check_email_free(holder.map(|u| u.user_id), user_id)?;
            Some(email.to_string())
        }
        None => None,
    };

    let password_hash = match req.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    let changes = UserChanges {
        first_name: req.first_name,
        last_name: req.last_name,
        email,
        password_hash,
        role,
    };

    let updated = store::update(&state.db, user_id, changes)
        .await
        .map_err(|e| {
            if store::is_duplicate_email(&e) {
                AppError::BadRequest("email_already_exists")
            } else {
                AppError::Database(e)
            }
        })?
        .ok_or(AppError::NotFound("user_not_found"))?;

    Ok(Json(json!({
        "signal": "user_update_success",
        "user_id": updated.user_id,
    })))
}

/// DELETE /api/v1/users/:id
///
/// Vector collections and files of the user's projects are removed first; the
/// database cascade takes care of every dependent row.
pub async fn handle_delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(user_id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    if store::find_by_id(&state.db, user_id).await?.is_none() {
        return Err(AppError::NotFound("user_not_found"));
    }

    for project_id in project_store::ids_owned_by(&state.db, user_id).await? {
        data::purge_project_artifacts(&state, project_id).await?;
    }

    if !store::delete(&state.db, user_id).await? {
        return Err(AppError::NotFound("user_not_found"));
    }
    info!("Admin {} deleted user {user_id}", admin.user_id);
    Ok(StatusCode::NO_CONTENT)
}
