use bcrypt::{hash, verify, DEFAULT_COST};

use crate::errors::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Hashes a password with bcrypt on the blocking pool.
pub async fn hash_password(plain: &str) -> Result<String, AppError> {
    let plain = plain.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(plain, DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(hashed)
}

/// Returns `false` for malformed hashes instead of failing the request.
pub async fn verify_password(plain: &str, hashed: &str) -> Result<bool, AppError> {
    let plain = plain.to_owned();
    let hashed = hashed.to_owned();
    let ok = tokio::task::spawn_blocking(move || verify(plain, &hashed).unwrap_or(false))
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(ok)
}

pub fn check_password_length(plain: &str) -> Result<(), AppError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::detailed(
            axum::http::StatusCode::BAD_REQUEST,
            "password_too_short",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hashed = hash_password("hunter22").await.unwrap();
        assert_ne!(hashed, "hunter22");
        assert!(hashed.starts_with('$'));
        assert!(verify_password("hunter22", &hashed).await.unwrap());
        assert!(!verify_password("hunter23", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_against_garbage_hash() {
        assert!(!verify_password("whatever", "not-a-hash").await.unwrap());
    }

    #[test]
    fn test_password_length() {
        assert!(check_password_length("12345").is_err());
        assert!(check_password_length("123456").is_ok());
    }
}
