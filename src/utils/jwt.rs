use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Default token lifetime: 24 hours.
pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User email
    pub exp: usize,  // Expiration timestamp (unix seconds)
}

/// Issues an HS256-signed token carrying the user's email as subject.
pub fn issue_token(
    secret: &str,
    email: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (Utc::now() + ttl).timestamp() as usize;

    let claims = Claims {
        sub: email.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn issue_token_default(
    secret: &str,
    email: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    issue_token(secret, email, Duration::hours(DEFAULT_TTL_HOURS))
}

/// Verifies signature and expiry. Malformed tokens, signature mismatches and
/// expired tokens all come back as `Err`; a token without a `sub` claim fails
/// deserialization and is rejected the same way.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    // A past expiry is always past; no clock leeway.
    validation.leeway = 0;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )
    .map(|data| data.claims)
}
