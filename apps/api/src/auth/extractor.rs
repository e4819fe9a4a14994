use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use crate::auth::tokens::TokenKind;
use crate::errors::AppError;
use crate::models::user::UserRole;
use crate::state::AppState;

/// The caller identified by a valid bearer access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Owners and admins may act on a resource.
    pub fn can_act_on(&self, owner_id: i32) -> bool {
        self.user_id == owner_id || self.is_admin()
    }
}

/// An authenticated caller holding the `ADMIN` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized("unauthorized"))?;

        let claims = state.tokens.decode(token).map_err(|e| {
            debug!("Rejected bearer token: {e}");
            AppError::Unauthorized("invalid_token")
        })?;

        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("invalid_token"));
        }
        let user_id = claims
            .user_id()
            .ok_or(AppError::Unauthorized("invalid_token"))?;
        let role = claims
            .role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or(UserRole::User);

        Ok(AuthUser {
            user_id,
            role,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("forbidden"));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    use crate::state::test_state;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let state = test_state();
        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.signal(), "unauthorized");
    }

    #[tokio::test]
    async fn test_garbage_token_is_invalid() {
        let state = test_state();
        let mut parts = parts_with(Some("Bearer not.a.jwt"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.signal(), "invalid_token");
    }

    #[tokio::test]
    async fn test_refresh_token_cannot_authenticate() {
        let state = test_state();
        let token = state.tokens.refresh_token(3).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.signal(), "invalid_token");
    }

    #[tokio::test]
    async fn test_access_token_yields_user() {
        let state = test_state();
        let token = state.tokens.access_token(3, "u@x.io", "MODERATOR").unwrap();
        let mut parts = parts_with(Some(&format!("bearer {token}")));
        let user = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(user.user_id, 3);
        assert_eq!(user.role, UserRole::Moderator);
        assert!(user.can_act_on(3));
        assert!(!user.can_act_on(4));
    }

    #[tokio::test]
    async fn test_admin_guard() {
        let state = test_state();
        let token = state.tokens.access_token(3, "u@x.io", "USER").unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let err = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.signal(), "forbidden");

        let token = state.tokens.access_token(1, "root@x.io", "ADMIN").unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let AdminUser(admin) = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(admin.can_act_on(99));
    }
}
