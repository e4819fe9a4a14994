pub mod extractor;
pub mod handlers;
pub mod password;
pub mod tokens;

use std::sync::LazyLock;

use axum::http::StatusCode;
use regex::Regex;

use crate::errors::AppError;

pub use extractor::{AdminUser, AuthUser};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if !EMAIL_PATTERN.is_match(email.trim()) {
        return Err(AppError::detailed(
            StatusCode::BAD_REQUEST,
            "invalid_email",
            "A valid email address is required",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("  ada.l@sub.example.org ").is_ok());
        assert!(validate_email("ada@example").is_err());
        assert!(validate_email("ada example.com").is_err());
        assert!(validate_email("").is_err());
    }
}
