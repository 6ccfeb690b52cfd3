use std::env;
use std::fmt;

/// Process-wide configuration, loaded once in `main` before the server
/// starts accepting connections. Read-only after startup.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub secret_key: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_region: Option<String>,
    pub bind_addr: String,
}

#[derive(Debug)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

fn required(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError(format!("{} must be set and non-empty", name))),
    }
}

impl AppConfig {
    /// Reads configuration from the environment. Startup is refused when the
    /// signing secret is missing; there is no insecure default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AppConfig {
            database_url: required("DATABASE_URL")?,
            secret_key: required("SECRET_KEY")?,
            s3_bucket: required("S3_BUCKET")?,
            s3_endpoint: env::var("S3_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://s3.amazonaws.com".to_string()),
            aws_region: env::var("AWS_REGION").ok().filter(|v| !v.is_empty()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
        })
    }
}
