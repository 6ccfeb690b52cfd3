use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::Validate;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::utils;
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
pub struct Credentials {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    access_token: String,
    token_type: String,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Uniqueness-checked user records. Emails match exactly, case-sensitive.
pub trait UserStore {
    async fn email_taken(&self, email: &str) -> Result<bool, AppError>;
    async fn insert_user(&self, email: &str, hashed_password: &str) -> Result<(), AppError>;
}

impl UserStore for PgPool {
    async fn email_taken(&self, email: &str) -> Result<bool, AppError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(self)
        .await?;
        Ok(taken)
    }

    async fn insert_user(&self, email: &str, hashed_password: &str) -> Result<(), AppError> {
        sqlx::query("INSERT INTO users (email, hashed_password) VALUES ($1, $2)")
            .bind(email)
            .bind(hashed_password)
            .execute(self)
            .await
            .map_err(|e| match &e {
                // The loser of a concurrent duplicate registration hits the
                // UNIQUE constraint here; that is still a conflict.
                sqlx::Error::Database(db)
                    if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
                {
                    AppError::Conflict("Email already registered".to_string())
                }
                _ => AppError::Database(e.to_string()),
            })?;
        Ok(())
    }
}

/// Registration flow: uniqueness check (fast path), hash, insert, token.
async fn register_user<S: UserStore>(
    store: &S,
    secret: &str,
    email: &str,
    password: &str,
) -> Result<String, AppError> {
    if store.email_taken(email).await? {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let hashed = utils::password::hash_password(password)
        .map_err(|e| AppError::Internal(format!("Hashing error: {}", e)))?;

    store.insert_user(email, &hashed).await?;

    utils::jwt::issue_token_default(secret, email)
        .map_err(|e| AppError::Internal(format!("Token generation error: {}", e)))
}

pub async fn register(
    req: web::Json<Credentials>,
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    validate_payload(&req.0)?;

    let token = register_user(&**pool, &config.secret_key, &req.email, &req.password).await?;

    Ok(HttpResponse::Ok().json(TokenResponse::bearer(token)))
}

pub async fn login(
    req: web::Json<Credentials>,
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let stored_hash = sqlx::query_scalar::<_, String>(
        "SELECT hashed_password FROM users WHERE email = $1",
    )
    .bind(&req.email)
    .fetch_optional(&**pool)
    .await?;

    // Unknown email and wrong password are indistinguishable to the caller.
    let valid = stored_hash
        .map(|hash| utils::password::verify_password(&req.password, &hash))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = utils::jwt::issue_token_default(&config.secret_key, &req.email)
        .map_err(|e| AppError::Internal(format!("Token generation error: {}", e)))?;

    Ok(HttpResponse::Ok().json(TokenResponse::bearer(token)))
}
