pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::conversations::handlers as conversations;
use crate::data::handlers as data;
use crate::errors::AppError;
use crate::maturity::handlers as maturity;
use crate::messages::handlers as messages;
use crate::projects::handlers as projects;
use crate::state::AppState;
use crate::users::handlers as users;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Paths are registered without a trailing slash; `main` wraps the router in
/// `NormalizePathLayer` so `/api/v1/users/` reaches the same handler.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_file_bytes() as usize + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health::health_handler))
        // Authentication
        .route("/api/v1/auth/register", post(auth::handle_register))
        .route("/api/v1/auth/login", post(auth::handle_login))
        .route("/api/v1/auth/refresh", post(auth::handle_refresh))
        .route("/api/v1/auth/verify-email", post(auth::handle_verify_email))
        .route(
            "/api/v1/auth/resend-verification",
            post(auth::handle_resend_verification),
        )
        .route(
            "/api/v1/auth/forgot-password",
            post(auth::handle_forgot_password),
        )
        .route(
            "/api/v1/auth/reset-password",
            post(auth::handle_reset_password),
        )
        // Users
        .route(
            "/api/v1/users",
            get(users::handle_list_users).post(users::handle_create_user),
        )
        .route(
            "/api/v1/users/:id",
            get(users::handle_get_user)
                .put(users::handle_update_user)
                .delete(users::handle_delete_user),
        )
        // Projects
        .route("/api/v1/projects", get(projects::handle_list_all_projects))
        .route(
            "/api/v1/personal-projects",
            get(projects::handle_list_my_projects).post(projects::handle_create_project),
        )
        .route(
            "/api/v1/personal-projects/public",
            get(projects::handle_list_public_projects),
        )
        .route(
            "/api/v1/personal-projects/:id",
            get(projects::handle_get_project)
                .put(projects::handle_update_project)
                .delete(projects::handle_delete_project),
        )
        // Conversations and messages
        .route(
            "/api/v1/conversations",
            get(conversations::handle_list_conversations)
                .post(conversations::handle_create_conversation),
        )
        .route(
            "/api/v1/conversations/:id",
            get(conversations::handle_get_conversation)
                .put(conversations::handle_update_conversation)
                .delete(conversations::handle_delete_conversation),
        )
        .route(
            "/api/v1/messages",
            get(messages::handle_list_messages).post(messages::handle_create_message),
        )
        .route(
            "/api/v1/messages/:id",
            get(messages::handle_get_message)
                .put(messages::handle_update_message)
                .delete(messages::handle_delete_message),
        )
        // Document ingestion
        .route(
            "/api/v1/data/assets/:project_id",
            get(data::handle_list_assets),
        )
        .route(
            "/api/v1/data/upload/:project_id",
            post(data::handle_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/data/process/:project_id",
            post(data::handle_process),
        )
        .route(
            "/api/v1/data/asset/:project_id/:asset_name",
            delete(data::handle_delete_asset),
        )
        // Maturity assessment
        .route(
            "/api/v1/maturity/analyze",
            post(maturity::handle_analyze).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .fallback(|| async { AppError::NotFound("not_found") })
        .with_state(state)
}
