//! Authentication and authorization

use crate::{ApiError, S3ErrorCode};
use crate::state::UserSession;
use jsonwebtoken::{decode, DecodingKey, Validation, Algorithm};
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc, Duration};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time
    pub exp: i64,
    /// Issued at
    pub iat: Option<i64>,
    /// Issuer
    pub iss: Option<String>,
    /// Audience
    pub aud: Option<Vec<String>>,
    /// Scopes
    #[serde(default)]
    pub scope: String,
    /// Name
    pub name: Option<String>,
}

/// Validate a JWT token and extract claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    
    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Token validation failed: {}", e);
            ApiError::s3(S3ErrorCode::InvalidToken, "Invalid or expired token")
        })
}

/// Convert claims to a user session
pub fn claims_to_session(claims: Claims) -> UserSession {
    let scopes: Vec<String> = claims.scope
        .split_whitespace()
        .map(|s| s.to_string())
        .collect();

    UserSession {
        user_id: claims.sub,
        display_name: claims.name,
        scopes,
        expires_at: DateTime::from_timestamp(claims.exp, 0)
            .unwrap_or_else(|| Utc::now() + Duration::hours(1)),
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
}

/// Hash a user ID for storage (privacy)
pub fn hash_user_id(user_id: &str) -> String {
    use fula_crypto::hashing::hash;
    let h = hash(user_id.as_bytes());
    h.to_hex()[..16].to_string()
}

/// Generate an anonymous user ID for unauthenticated requests
pub fn anonymous_user_id() -> String {
    "anonymous".to_string()
}

/// Create a development/test session
pub fn dev_session() -> UserSession {
    UserSession {
        user_id: "dev-user".to_string(),
        display_name: Some("Development User".to_string()),
        scopes: vec!["storage:*".to_string()],
        expires_at: Utc::now() + Duration::days(365),
    }
}
