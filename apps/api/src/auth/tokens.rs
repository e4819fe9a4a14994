use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("unsupported JWT algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }
}

/// Signs and verifies access / refresh tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn from_config(config: &Config) -> Result<Self, TokenError> {
        let algorithm = match config.jwt_algorithm.to_ascii_uppercase().as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => return Err(TokenError::UnsupportedAlgorithm(other.to_string())),
        };
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            algorithm,
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
        })
    }

    pub fn access_token(
        &self,
        user_id: i32,
        email: &str,
        role: &str,
    ) -> Result<String, TokenError> {
        self.sign(
            user_id,
            Some(email.to_string()),
            Some(role.to_string()),
            TokenKind::Access,
            self.access_ttl,
        )
    }

    pub fn refresh_token(&self, user_id: i32) -> Result<String, TokenError> {
        self.sign(user_id, None, None, TokenKind::Refresh, self.refresh_ttl)
    }

    fn sign(
        &self,
        user_id: i32,
        email: Option<String>,
        role: Option<String>,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email,
            role,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding)?)
    }

    /// Verifies signature and expiry. The token kind is left to the caller.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// 32 random bytes, base64url encoded. Used for verification and reset links.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::from_config(&Config::for_tests()).unwrap()
    }

    #[test]
    fn test_access_token_round_trip() {
        let issuer = issuer();
        let token = issuer.access_token(42, "a@b.io", "ADMIN").unwrap();
        let claims = issuer.decode(&token).unwrap();
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.email.as_deref(), Some("a@b.io"));
        assert_eq!(claims.role.as_deref(), Some("ADMIN"));
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_token_has_no_identity_claims() {
        let issuer = issuer();
        let token = issuer.refresh_token(7).unwrap();
        let claims = issuer.decode(&token).unwrap();
        assert_eq!(claims.kind, TokenKind::Refresh);
        assert!(claims.email.is_none());
        assert!(claims.role.is_none());
    }

    #[test]
    fn test_type_claim_is_serialized_as_type() {
        let issuer = issuer();
        let token = issuer.refresh_token(7).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert_eq!(json["type"], "refresh");
        assert_eq!(json["sub"], "7");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issuer().access_token(1, "x@y.z", "USER").unwrap();
        let mut other = Config::for_tests();
        other.jwt_secret = "another-secret".to_string();
        let other = TokenIssuer::from_config(&other).unwrap();
        assert!(other.decode(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let mut config = Config::for_tests();
        config.access_token_minutes = -5;
        let issuer = TokenIssuer::from_config(&config).unwrap();
        let token = issuer.access_token(1, "x@y.z", "USER").unwrap();
        assert!(issuer.decode(&token).is_err());
    }

    #[test]
    fn test_unknown_algorithm() {
        let mut config = Config::for_tests();
        config.jwt_algorithm = "RS256".to_string();
        assert!(matches!(
            TokenIssuer::from_config(&config),
            Err(TokenError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_random_tokens_are_url_safe_and_unique() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
