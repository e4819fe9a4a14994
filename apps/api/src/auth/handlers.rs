use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::password::{check_password_length, hash_password, verify_password};
use crate::auth::tokens::{random_token, TokenKind};
use crate::auth::validate_email;
use crate::errors::AppError;
use crate::extractors::AppJson;
use crate::models::user::UserRole;
use crate::state::AppState;
use crate::users::store::{self, NewUser};

const RESET_TOKEN_TTL_HOURS: i64 = 1;

// ─── Request / response bodies ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i32,
    pub email: String,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Self-registration never grants `ADMIN`.
fn registration_role(requested: Option<&str>) -> UserRole {
    match requested.and_then(|r| r.parse::<UserRole>().ok()) {
        Some(UserRole::Moderator) => UserRole::Moderator,
        _ => UserRole::User,
    }
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let email = req.email.trim().to_string();
    validate_email(&email)?;
    check_password_length(&req.password)?;

    if store::find_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::BadRequest("email_already_exists"));
    }

    let password_hash = hash_password(&req.password).await?;
    let token = random_token();
    let user = store::insert(
        &state.db,
        NewUser {
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            email: &email,
            password_hash: &password_hash,
            role: registration_role(req.role.as_deref()),
            email_verified: false,
            verification_token: Some(&token),
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

    if let Err(e) = state
        .mailer
        .send_verification_email(&user.email, &user.first_name, &token)
        .await
    {
        warn!("Could not send verification email to {}: {e}", user.email);
    }
    info!("Registered user {} ({})", user.user_id, user.email);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.user_id,
            email: user.email,
            message: "Registration successful. Check your inbox to verify your email address.",
        }),
    ))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let user = store::find_by_email(&state.db, req.email.trim())
        .await?
        .ok_or(AppError::Unauthorized("invalid_credentials"))?;

    if !verify_password(&req.password, &user.password_hash).await? {
        return Err(AppError::Unauthorized("invalid_credentials"));
    }

    if !user.email_verified {
        return Err(AppError::with_message(
            StatusCode::FORBIDDEN,
            "email_not_verified",
            "Please verify your email address before logging in.",
        ));
    }

    let access_token = state
        .tokens
        .access_token(user.user_id, &user.email, user.role().as_str())
        .map_err(|e| AppError::Internal(e.into()))?;
    let refresh_token = state
        .tokens
        .refresh_token(user.user_id)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(TokenPair {
        access_token,
        refresh_token,
    }))
}

/// POST /api/v1/auth/refresh
pub async fn handle_refresh(
    State(state): State<AppState>,
    AppJson(req): AppJson<RefreshRequest>,
) -> Result<Json<Value>, AppError> {
    let claims = state
        .tokens
        .decode(&req.refresh_token)
        .map_err(|_| AppError::Unauthorized("invalid_token"))?;

    if claims.kind != TokenKind::Refresh {
        return Err(AppError::BadRequest("invalid_token_type"));
    }

    let user_id = claims
        .user_id()
        .ok_or(AppError::Unauthorized("invalid_token"))?;
    let user = store::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::Unauthorized("user_not_found"))?;

    let access_token = state
        .tokens
        .access_token(user.user_id, &user.email, user.role().as_str())
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(json!({ "access_token": access_token })))
}

/// POST /api/v1/auth/verify-email
pub async fn handle_verify_email(
    State(state): State<AppState>,
    AppJson(req): AppJson<TokenRequest>,
) -> Result<Json<Value>, AppError> {
    let user = store::find_by_verification_token(&state.db, &req.token)
        .await?
        .ok_or(AppError::BadRequest("invalid_token"))?;

    if user.email_verified {
        return Err(AppError::BadRequest("email_already_verified"));
    }

    store::mark_verified(&state.db, user.user_id).await?;
    info!("Email verified for user {}", user.user_id);
    Ok(message("Email verified successfully"))
}

/// POST /api/v1/auth/resend-verification
pub async fn handle_resend_verification(
    State(state): State<AppState>,
    AppJson(req): AppJson<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    let Some(user) = store::find_by_email(&state.db, req.email.trim()).await? else {
        return Ok(message(
            "If this email exists, a verification email has been sent.",
        ));
    };

    if user.email_verified {
        return Err(AppError::BadRequest("email_already_verified"));
    }

    let token = random_token();
    store::set_verification_token(&state.db, user.user_id, &token).await?;
    if let Err(e) = state
        .mailer
        .send_verification_email(&user.email, &user.first_name, &token)
        .await
    {
        warn!("Could not resend verification email to {}: {e}", user.email);
    }

    Ok(message("A verification email has been sent."))
}

/// POST /api/v1/auth/forgot-password
pub async fn handle_forgot_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    const GENERIC: &str = "If this email exists, a password reset email has been sent.";

    let Some(user) = store::find_by_email(&state.db, req.email.trim()).await? else {
        return Ok(message(GENERIC));
    };

    let token = random_token();
    let expires = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
    store::set_reset_token(&state.db, user.user_id, &token, expires).await?;

    if let Err(e) = state
        .mailer
        .send_password_reset_email(&user.email, &user.first_name, &token)
        .await
    {
        warn!("Could not send password reset email to {}: {e}", user.email);
    }

    Ok(message(GENERIC))
}

/// POST /api/v1/auth/reset-password
pub async fn handle_reset_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let user = store::find_by_reset_token(&state.db, &req.token)
        .await?
        .ok_or(AppError::BadRequest("invalid_token"))?;

    let expired = user
        .password_reset_expires
        .map_or(true, |expires| expires < Utc::now());
    if expired {
        return Err(AppError::BadRequest("token_expired"));
    }

    check_password_length(&req.new_password)?;

    let password_hash = hash_password(&req.new_password).await?;
    store::reset_password(&state.db, user.user_id, &password_hash).await?;
    info!("Password reset for user {}", user.user_id);

    Ok(message("Password reset successfully"))
}
