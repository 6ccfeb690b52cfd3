use actix_web::HttpRequest;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::user::User;
use crate::utils::jwt;

/// Extracts the token from an `Authorization` header value. The scheme
/// prefix is matched exactly: literal `Bearer`, one space, case-sensitive.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))
}

/// Resolves the calling user from the request's bearer token. Every failure
/// mode (missing/malformed header, bad signature, expired token, vanished
/// user) surfaces as 401; the body text is the only distinction.
pub async fn resolve_user(
    req: &HttpRequest,
    pool: &PgPool,
    config: &AppConfig,
) -> Result<User, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok());
    let token = bearer_token(header)?;

    let claims = jwt::decode_token(&config.secret_key, token)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    // Exact email match; a token for a deleted or never-existing user is
    // rejected here even though its signature is valid.
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, hashed_password FROM users WHERE email = $1",
    )
    .bind(&claims.sub)
    .fetch_optional(pool)
    .await?;

    user.ok_or_else(|| AppError::Unauthorized("User not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exact_bearer_prefix() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn rejects_missing_header() {
        assert!(bearer_token(None).is_err());
    }

    #[test]
    fn rejects_wrong_scheme_or_casing() {
        assert!(bearer_token(Some("bearer abc")).is_err());
        assert!(bearer_token(Some("BEARER abc")).is_err());
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearerabc")).is_err());
        assert!(bearer_token(Some("Bearer")).is_err());
    }

    #[test]
    fn token_is_everything_after_the_prefix() {
        // A second space belongs to the token and fails later, at decode.
        assert_eq!(bearer_token(Some("Bearer  abc")).unwrap(), " abc");
    }
}
