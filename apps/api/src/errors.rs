use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every response body carries a `signal`: a stable, machine-readable code the
/// frontend switches on.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(&'static str),

    #[error("Bad request: {0}")]
    BadRequest(&'static str),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    /// A rejection that also carries a human readable explanation, rendered
    /// under `detail_key` (`error` or `message`).
    #[error("{signal}: {message}")]
    Detailed {
        status: StatusCode,
        signal: &'static str,
        detail_key: &'static str,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn detailed(status: StatusCode, signal: &'static str, message: impl Into<String>) -> Self {
        AppError::Detailed {
            status,
            signal,
            detail_key: "error",
            message: message.into(),
        }
    }

    /// Like [`AppError::detailed`] but the explanation goes under `message`.
    pub fn with_message(
        status: StatusCode,
        signal: &'static str,
        message: impl Into<String>,
    ) -> Self {
        AppError::Detailed {
            status,
            signal,
            detail_key: "message",
            message: message.into(),
        }
    }

    pub fn signal(&self) -> &'static str {
        match self {
            AppError::NotFound(s)
            | AppError::BadRequest(s)
            | AppError::Unauthorized(s)
            | AppError::Forbidden(s) => s,
            AppError::Detailed { signal, .. } => signal,
            AppError::Database(_) => "database_error",
            AppError::Storage(_) => "storage_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let signal = self.signal();
        let (status, detail) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, None),
            AppError::Detailed {
                status,
                detail_key,
                message,
                ..
            } => (*status, Some((*detail_key, message.clone()))),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let mut body = Map::new();
        body.insert("signal".to_string(), Value::from(signal));
        if let Some((key, message)) = detail {
            body.insert(key.to_string(), Value::from(message));
        }

        (status, Json(Value::Object(body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_renders_signal() {
        let (status, body) = render(AppError::NotFound("user_not_found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "signal": "user_not_found" }));
    }

    #[tokio::test]
    async fn test_detailed_includes_error_message() {
        let (status, body) = render(AppError::detailed(
            StatusCode::BAD_REQUEST,
            "project_creation_error",
            "Project name is required",
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["signal"], "project_creation_error");
        assert_eq!(body["error"], "Project name is required");
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let (status, body) = render(AppError::Internal(anyhow::anyhow!("secret"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "signal": "internal_error" }));
    }

    #[tokio::test]
    async fn test_with_message_uses_message_key() {
        let (status, body) = render(AppError::with_message(
            StatusCode::FORBIDDEN,
            "email_not_verified",
            "Verify your email address before logging in.",
        ))
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["signal"], "email_not_verified");
        assert!(body.get("error").is_none());
        assert!(body["message"].as_str().unwrap().contains("Verify"));
    }

    #[test]
    fn test_database_signal() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.signal(), "database_error");
    }
}
