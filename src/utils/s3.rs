use aws_config::BehaviorVersion;
use aws_config::ConfigLoader;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use aws_types::region::Region;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;

// '/' stays literal so the owner-id prefix remains a path segment.
const KEY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub async fn create_s3_client(config: &AppConfig) -> S3Client {
    let mut loader = ConfigLoader::default()
        .region(config.aws_region.clone().map(Region::new))
        .behavior_version(BehaviorVersion::latest());
    if config.s3_endpoint != "https://s3.amazonaws.com" {
        loader = loader.endpoint_url(&config.s3_endpoint);
    }
    let aws_config = loader.load().await;

    // Path-style addressing so S3-compatible stores behind a single hostname
    // (MinIO, Supabase) resolve the bucket from the path, matching the
    // public URLs we hand out.
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();
    S3Client::from_conf(s3_config)
}

/// Object key for an upload: `{owner_id}/{uuid}_{filename}`. The random UUID
/// keeps two uploads with the same filename from colliding in the bucket,
/// where a duplicate key is rejected as a conflict.
pub fn unique_object_key(owner_id: i32, original_filename: &str) -> String {
    format!("{}/{}_{}", owner_id, Uuid::new_v4(), original_filename)
}

/// Public URL for a stored object: `{endpoint}/{bucket}/{encoded key}`.
pub fn public_object_url(config: &AppConfig, key: &str) -> String {
    format!(
        "{}/{}/{}",
        config.s3_endpoint,
        config.s3_bucket,
        utf8_percent_encode(key, KEY_ENCODE)
    )
}

/// Recovers the in-bucket object key from a stored public URL: everything
/// after the `/{bucket}/` marker segment, percent-decoded. A URL that does
/// not point into our bucket is a dependency error, never a silent skip.
pub fn object_key_from_url(file_url: &str, bucket: &str) -> Result<String, AppError> {
    let parsed = Url::parse(file_url)
        .map_err(|e| AppError::Dependency(format!("Malformed file URL '{}': {}", file_url, e)))?;

    let marker = format!("/{}/", bucket);
    let path = parsed.path();
    let key = path
        .split_once(&marker)
        .map(|(_, rest)| rest)
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| {
            AppError::Dependency(format!(
                "File URL '{}' does not contain an object path in bucket '{}'",
                file_url, bucket
            ))
        })?;

    percent_decode_str(key)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| AppError::Dependency(format!("Undecodable object path in '{}': {}", file_url, e)))
}

/// Upload/remove seam over the object store, so note flows can be exercised
/// against a stub without a live bucket.
pub trait BlobStore {
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), AppError>;
    async fn remove(&self, bucket: &str, key: &str) -> Result<(), AppError>;
}

impl BlobStore for S3Client {
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), AppError> {
        self.put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                log::error!("S3 upload failed for '{}': {}", key, e);
                AppError::Dependency(format!("Failed to upload object '{}': {}", key, e))
            })?;
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), AppError> {
        self.delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                log::error!("S3 remove failed for '{}': {}", key, e);
                AppError::Dependency(format!("Failed to remove object '{}': {}", key, e))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/notes".into(),
            secret_key: "unit-test-secret".into(),
            s3_bucket: "notes-files".into(),
            s3_endpoint: "https://storage.example.com".into(),
            aws_region: None,
            bind_addr: "127.0.0.1:8080".into(),
        }
    }

    #[test]
    fn key_round_trips_through_public_url() {
        let config = test_config();
        let key = "7/9b2e-some-uuid_report final.pdf";
        let url = public_object_url(&config, key);
        assert_eq!(
            url,
            "https://storage.example.com/notes-files/7/9b2e-some-uuid_report%20final.pdf"
        );
        assert_eq!(
            object_key_from_url(&url, &config.s3_bucket).unwrap(),
            key
        );
    }

    #[test]
    fn url_outside_bucket_is_an_error() {
        assert!(object_key_from_url(
            "https://storage.example.com/other-bucket/1/a.txt",
            "notes-files"
        )
        .is_err());
        assert!(object_key_from_url("https://storage.example.com/notes-files/", "notes-files")
            .is_err());
        assert!(object_key_from_url("not a url", "notes-files").is_err());
    }

    #[test]
    fn same_filename_gets_distinct_keys() {
        let a = unique_object_key(1, "notes.txt");
        let b = unique_object_key(1, "notes.txt");
        assert_ne!(a, b);
        assert!(a.starts_with("1/"));
        assert!(a.ends_with("_notes.txt"));
    }
}
