use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpRequest, HttpResponse};
use aws_sdk_s3::Client as S3Client;
use futures_util::TryStreamExt;
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::note::Note;
use crate::utils;
use crate::utils::identity::resolve_user;
use crate::utils::s3::BlobStore;
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
pub struct NewNote {
    #[validate(length(min = 1))]
    title: String,
    content: Option<String>,
    file_url: Option<String>,
}

/// Ownership-scoped lookup and removal. The Postgres implementation carries
/// the real queries; tests drive the flows below with an in-memory store.
pub trait NoteStore {
    async fn find_owned(&self, note_id: i32, owner_id: i32) -> Result<Option<Note>, AppError>;
    async fn remove(&self, note_id: i32, owner_id: i32) -> Result<(), AppError>;
}

impl NoteStore for PgPool {
    async fn find_owned(&self, note_id: i32, owner_id: i32) -> Result<Option<Note>, AppError> {
        let note = sqlx::query_as::<_, Note>(
            "SELECT id, title, content, user_id, file_url FROM notes
             WHERE id = $1 AND user_id = $2",
        )
        .bind(note_id)
        .bind(owner_id)
        .fetch_optional(self)
        .await?;
        Ok(note)
    }

    async fn remove(&self, note_id: i32, owner_id: i32) -> Result<(), AppError> {
        sqlx::query("DELETE FROM notes WHERE id = $1 AND user_id = $2")
            .bind(note_id)
            .bind(owner_id)
            .execute(self)
            .await?;
        Ok(())
    }
}

/// Existence and ownership are one predicate; a note owned by someone else
/// is reported exactly like a note that never existed.
async fn find_owned_note<S: NoteStore>(
    store: &S,
    owner_id: i32,
    note_id: i32,
) -> Result<Note, AppError> {
    store
        .find_owned(note_id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Note not found".to_string()))
}

/// Fail-closed deletion: the blob goes first, and any failure (including a
/// stored URL that no longer maps into the bucket) aborts before the row is
/// touched, so the delete can be retried.
async fn delete_owned_note<S: NoteStore, B: BlobStore>(
    store: &S,
    blobs: &B,
    bucket: &str,
    owner_id: i32,
    note_id: i32,
) -> Result<(), AppError> {
    let note = find_owned_note(store, owner_id, note_id).await?;

    if let Some(file_url) = &note.file_url {
        let key = utils::s3::object_key_from_url(file_url, bucket)?;
        blobs.remove(bucket, &key).await?;
    }

    store.remove(note.id, owner_id).await
}

pub async fn create_note(
    req: HttpRequest,
    payload: web::Json<NewNote>,
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let user = resolve_user(&req, &pool, &config).await?;
    validate_payload(&payload.0)?;

    let note = sqlx::query_as::<_, Note>(
        "INSERT INTO notes (title, content, file_url, user_id) VALUES ($1, $2, $3, $4)
         RETURNING id, title, content, user_id, file_url",
    )
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(&payload.file_url)
    .bind(user.id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(note))
}

pub async fn list_notes(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let user = resolve_user(&req, &pool, &config).await?;

    let notes = sqlx::query_as::<_, Note>(
        "SELECT id, title, content, user_id, file_url FROM notes
         WHERE user_id = $1 ORDER BY id",
    )
    .bind(user.id)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(notes))
}

pub async fn get_note(
    req: HttpRequest,
    note_id: web::Path<i32>,
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let user = resolve_user(&req, &pool, &config).await?;

    let note = find_owned_note(&**pool, user.id, note_id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(note))
}

pub async fn delete_note(
    req: HttpRequest,
    note_id: web::Path<i32>,
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    s3_client: web::Data<S3Client>,
) -> Result<HttpResponse, AppError> {
    let user = resolve_user(&req, &pool, &config).await?;

    delete_owned_note(
        &**pool,
        s3_client.get_ref(),
        &config.s3_bucket,
        user.id,
        note_id.into_inner(),
    )
    .await?;

    Ok(HttpResponse::NoContent().finish())
}

async fn read_field_bytes(field: &mut Field) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

async fn read_field_text(field: &mut Field) -> Result<String, AppError> {
    let bytes = read_field_bytes(field).await?;
    String::from_utf8(bytes)
        .map_err(|_| AppError::Validation("Form field is not valid UTF-8".to_string()))
}

pub async fn upload_note(
    req: HttpRequest,
    mut payload: Multipart,
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    s3_client: web::Data<S3Client>,
) -> Result<HttpResponse, AppError> {
    let user = resolve_user(&req, &pool, &config).await?;

    let mut title: Option<String> = None;
    let mut content: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or("")
            .to_string();
        match name.as_str() {
            "title" => title = Some(read_field_text(&mut field).await?),
            "content" => content = Some(read_field_text(&mut field).await?),
            "file" => {
                filename = field
                    .content_disposition()
                    .get_filename()
                    .map(|f| f.to_string());
                file_bytes = Some(read_field_bytes(&mut field).await?);
            }
            // Unknown parts are drained and ignored.
            _ => {
                read_field_bytes(&mut field).await?;
            }
        }
    }

    let title = title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("title is required".to_string()))?;
    let file_bytes =
        file_bytes.ok_or_else(|| AppError::Validation("file is required".to_string()))?;
    let filename = filename.unwrap_or_else(|| "file".to_string());

    // Blob first; no note row exists without a confirmed upload.
    let key = utils::s3::unique_object_key(user.id, &filename);
    s3_client
        .get_ref()
        .upload(&config.s3_bucket, &key, file_bytes)
        .await?;
    let file_url = utils::s3::public_object_url(&config, &key);

    let note = sqlx::query_as::<_, Note>(
        "INSERT INTO notes (title, content, file_url, user_id) VALUES ($1, $2, $3, $4)
         RETURNING id, title, content, user_id, file_url",
    )
    .bind(&title)
    .bind(&content)
    .bind(&file_url)
    .bind(user.id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(note))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const BUCKET: &str = "notes-files";

    struct MemNotes {
        rows: Mutex<Vec<Note>>,
    }

    impl MemNotes {
        fn with(rows: Vec<Note>) -> Self {
            MemNotes { rows: Mutex::new(rows) }
        }

        fn contains(&self, note_id: i32) -> bool {
            self.rows.lock().unwrap().iter().any(|n| n.id == note_id)
        }
    }

    impl NoteStore for MemNotes {
        async fn find_owned(&self, note_id: i32, owner_id: i32) -> Result<Option<Note>, AppError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|n| n.id == note_id && n.user_id == owner_id)
                .cloned())
        }

        async fn remove(&self, note_id: i32, owner_id: i32) -> Result<(), AppError> {
            self.rows
                .lock()
                .unwrap()
                .retain(|n| !(n.id == note_id && n.user_id == owner_id));
            Ok(())
        }
    }

    struct StubBlobs {
        fail: bool,
        removed: Mutex<Vec<String>>,
    }

    impl StubBlobs {
        fn working() -> Self {
            StubBlobs { fail: false, removed: Mutex::new(Vec::new()) }
        }

        fn failing() -> Self {
            StubBlobs { fail: true, removed: Mutex::new(Vec::new()) }
        }
    }

    impl BlobStore for StubBlobs {
        async fn upload(&self, _bucket: &str, _key: &str, _bytes: Vec<u8>) -> Result<(), AppError> {
            Ok(())
        }

        async fn remove(&self, _bucket: &str, key: &str) -> Result<(), AppError> {
            if self.fail {
                return Err(AppError::Dependency("storage offline".to_string()));
            }
            self.removed.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    fn note(id: i32, owner_id: i32, file_url: Option<&str>) -> Note {
        Note {
            id,
            title: "hi".to_string(),
            content: None,
            user_id: owner_id,
            file_url: file_url.map(|u| u.to_string()),
        }
    }

    #[actix_web::test]
    async fn get_is_scoped_to_the_owner() {
        let store = MemNotes::with(vec![note(1, 2, None)]);

        // Another user's note reads as absent, never as forbidden.
        let err = find_owned_note(&store, 1, 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let found = find_owned_note(&store, 2, 1).await.unwrap();
        assert_eq!(found.id, 1);
    }

    #[actix_web::test]
    async fn cross_user_delete_is_not_found_and_keeps_the_row() {
        let store = MemNotes::with(vec![note(1, 2, None)]);
        let blobs = StubBlobs::working();

        let err = delete_owned_note(&store, &blobs, BUCKET, 1, 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.contains(1));
    }

    #[actix_web::test]
    async fn failed_blob_removal_keeps_the_note() {
        let url = "https://storage.example.com/notes-files/2/abc_a.txt";
        let store = MemNotes::with(vec![note(1, 2, Some(url))]);
        let blobs = StubBlobs::failing();

        let err = delete_owned_note(&store, &blobs, BUCKET, 2, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Dependency(_)));

        // The row survives, so a later Get still succeeds and the delete can
        // be retried.
        assert!(find_owned_note(&store, 2, 1).await.is_ok());
    }

    #[actix_web::test]
    async fn delete_removes_exactly_one_blob_with_the_decoded_key() {
        let url = "https://storage.example.com/notes-files/2/abc_report%20final.pdf";
        let store = MemNotes::with(vec![note(1, 2, Some(url))]);
        let blobs = StubBlobs::working();

        delete_owned_note(&store, &blobs, BUCKET, 2, 1).await.unwrap();

        let removed = blobs.removed.lock().unwrap();
        assert_eq!(removed.as_slice(), ["2/abc_report final.pdf"]);
        assert!(!store.contains(1));
    }

    #[actix_web::test]
    async fn unparseable_file_url_aborts_the_delete() {
        let store = MemNotes::with(vec![note(1, 2, Some("https://elsewhere.example.com/x"))]);
        let blobs = StubBlobs::working();

        let err = delete_owned_note(&store, &blobs, BUCKET, 2, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Dependency(_)));
        assert!(blobs.removed.lock().unwrap().is_empty());
        assert!(store.contains(1));
    }

    #[actix_web::test]
    async fn delete_without_attachment_skips_the_blob_store() {
        let store = MemNotes::with(vec![note(1, 2, None)]);
        let blobs = StubBlobs::working();

        delete_owned_note(&store, &blobs, BUCKET, 2, 1).await.unwrap();
        assert!(blobs.removed.lock().unwrap().is_empty());
        assert!(!store.contains(1));
    }
}
