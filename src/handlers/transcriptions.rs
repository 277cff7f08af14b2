//! # Transcription Endpoints
//!
//! The transcription pipeline and the query endpoints over stored records.
//!
//! ## Available Endpoints:
//! - `POST /transcribe` - upload one or more audio files and transcribe them
//! - `GET /transcriptions` - all records, newest first
//! - `GET /search?query=Q` - records whose filename contains Q
//! - `GET /transcriptions/{id}` - one record by id
//!
//! ## Pipeline:
//! For each uploaded file, strictly in order: save to the file store, run
//! the transcription engine, persist the record, append its public view to
//! the response. The first failure aborts the whole request; records
//! already written for earlier files in the batch remain.

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::storage::TranscriptionView;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;

/// Query string for GET /search.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// One file pulled out of the multipart payload.
struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

/// Drain the multipart payload, keeping fields named `files` that carry a
/// filename. Enforces the per-file size cap while reading so an oversized
/// upload is rejected without buffering all of it.
async fn collect_uploads(payload: &mut Multipart, max_bytes: usize) -> AppResult<Vec<UploadedFile>> {
    let mut uploads = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let (field_name, filename) = {
            let content_disposition = field.content_disposition().ok_or_else(|| {
                AppError::BadRequest("Missing content disposition".to_string())
            })?;
            (
                content_disposition.get_name().map(str::to_string),
                content_disposition.get_filename().map(str::to_string),
            )
        };

        // Fields under any other name, and plain form values, are ignored.
        if field_name.as_deref() != Some("files") {
            continue;
        }
        let Some(filename) = filename else {
            continue;
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::BadRequest(format!(
                    "File {} exceeds the upload limit of {} bytes",
                    filename, max_bytes
                )));
            }

            bytes.extend_from_slice(&chunk);
        }

        uploads.push(UploadedFile { filename, bytes });
    }

    Ok(uploads)
}

/// `POST /transcribe`: the transcription pipeline.
///
/// Returns one public record view per uploaded file, in upload order.
/// Zero files is a 400 before any file is touched.
pub async fn transcribe(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let uploads = collect_uploads(&mut payload, state.config.storage.max_upload_bytes).await?;

    if uploads.is_empty() {
        return Err(AppError::BadRequest("No files provided".to_string()));
    }

    let mut results: Vec<TranscriptionView> = Vec::with_capacity(uploads.len());

    for upload in uploads {
        let saved = state.files.save(&upload.filename, &upload.bytes)?;

        // Inference is CPU-bound and the engine serializes access
        // internally; run it on the blocking pool.
        let engine = Arc::clone(&state.engine);
        let audio_path = saved.path.clone();
        let text = web::block(move || engine.transcribe(&audio_path))
            .await
            .map_err(|e| AppError::Internal(format!("Transcription task failed: {}", e)))??;

        let record = state
            .store
            .create(&saved.original_filename, &saved.unique_filename, &text)
            .await?;

        results.push(record.to_view());
    }

    Ok(HttpResponse::Ok().json(results))
}

/// `GET /transcriptions`: all records, newest first.
pub async fn list_transcriptions(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let records = state.store.list_all().await?;
    let views: Vec<TranscriptionView> = records.iter().map(|r| r.to_view()).collect();
    Ok(HttpResponse::Ok().json(views))
}

/// `GET /search?query=Q`: records whose filename contains Q.
///
/// A missing or empty query is rejected here; it never reaches the store.
pub async fn search_transcriptions(
    state: web::Data<AppState>,
    params: web::Query<SearchParams>,
) -> AppResult<HttpResponse> {
    let query = params.query.as_deref().unwrap_or("");
    if query.is_empty() {
        return Err(AppError::BadRequest("Query parameter is required".to_string()));
    }

    let records = state.store.search(query).await?;
    let views: Vec<TranscriptionView> = records.iter().map(|r| r.to_view()).collect();
    Ok(HttpResponse::Ok().json(views))
}

/// `GET /transcriptions/{id}`: one record, or 404.
pub async fn get_transcription(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();

    match state.store.get_by_id(id).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record.to_view())),
        None => Err(AppError::NotFound(format!(
            "Transcription with ID {} not found",
            id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::files::FileStore;
    use crate::storage::TranscriptionStore;
    use crate::transcription::{FixedTranscriber, FIXED_TRANSCRIPT};
    use actix_web::{test, App};
    use serde_json::Value;

    const BOUNDARY: &str = "----test-boundary-4fA91xWv";

    async fn test_state(upload_dir: &std::path::Path, max_upload_bytes: usize) -> AppState {
        let pool = crate::storage::connect("sqlite::memory:").await.unwrap();
        let store = TranscriptionStore::new(pool);
        store.init_schema().await.unwrap();

        let mut config = AppConfig::default();
        config.storage.upload_dir = upload_dir.display().to_string();
        config.storage.max_upload_bytes = max_upload_bytes;

        AppState::new(
            config,
            store,
            FileStore::new(upload_dir),
            Arc::new(FixedTranscriber::default()),
        )
    }

    /// Build a multipart/form-data body with one `files` part per entry.
    fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (filename, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n\
                     Content-Type: audio/wav\r\n\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn multipart_request(uri: &str, files: &[(&str, &[u8])]) -> test::TestRequest {
        test::TestRequest::post()
            .uri(uri)
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body(files))
    }

    macro_rules! test_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .configure(crate::handlers::configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_health_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), 1024).await;
        let app = test_app!(state);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
        assert!(resp.status().is_success());

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
    }

    #[actix_web::test]
    async fn test_transcribe_no_files_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), 1024).await;
        let app = test_app!(state);

        // A form with a plain field but no file parts.
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n",
                BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let req = test::TestRequest::post()
            .uri("/transcribe")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body);

        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), 400);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "No files provided");
    }

    #[actix_web::test]
    async fn test_transcribe_returns_one_record_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), 1024).await;
        let app = test_app!(state);

        let req = multipart_request(
            "/transcribe",
            &[
                ("first_clip.wav", b"dummy audio data".as_slice()),
                ("second_clip.wav", b"more dummy data".as_slice()),
            ],
        );
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), 200);

        let body: Value = test::read_body_json(resp).await;
        let results = body.as_array().unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0]["filename"], "first_clip.wav");
        assert_eq!(results[1]["filename"], "second_clip.wav");
        for result in results {
            assert!(result["id"].as_i64().unwrap() > 0);
            assert_eq!(result["text"], FIXED_TRANSCRIPT);
            assert!(result["unique_filename"].as_str().unwrap().ends_with(".wav"));
        }
    }

    #[actix_web::test]
    async fn test_transcribe_stores_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), 1024).await;
        let app = test_app!(state);

        let req =
            multipart_request("/transcribe", &[("clip.wav", b"dummy audio data".as_slice())]);
        let body: Value = test::call_and_read_body_json(&app, req.to_request()).await;

        let stored = dir
            .path()
            .join(body[0]["unique_filename"].as_str().unwrap());
        assert_eq!(std::fs::read(stored).unwrap(), b"dummy audio data");
    }

    #[actix_web::test]
    async fn test_transcribe_oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), 8).await;
        let app = test_app!(state);

        let req = multipart_request(
            "/transcribe",
            &[("big.wav", b"way more than eight bytes".as_slice())],
        );
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), 400);

        // Nothing was persisted for the rejected upload.
        let listed: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/transcriptions").to_request(),
        )
        .await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_list_is_newest_first_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), 1024).await;
        let app = test_app!(state);

        for name in ["one.wav", "two.wav", "three.wav"] {
            let req = multipart_request("/transcribe", &[(name, b"dummy audio data".as_slice())]);
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), 200);
        }

        let first: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/transcriptions").to_request(),
        )
        .await;
        let records = first.as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["filename"], "three.wav");
        assert_eq!(records[2]["filename"], "one.wav");

        for pair in records.windows(2) {
            let newer = pair[0]["created_at"].as_str().unwrap();
            let older = pair[1]["created_at"].as_str().unwrap();
            assert!(newer >= older);
        }

        // No intervening writes: a second read returns the identical body.
        let second: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/transcriptions").to_request(),
        )
        .await;
        assert_eq!(first, second);
    }

    #[actix_web::test]
    async fn test_search_validation_and_results() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), 1024).await;
        let app = test_app!(state);

        // Missing query → 400 with an error field
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/search").to_request()).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());

        // Empty query → 400 as well
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/search?query=").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);

        let req = multipart_request(
            "/transcribe",
            &[("test_audio.wav", b"dummy audio data".as_slice())],
        );
        test::call_service(&app, req.to_request()).await;

        // Matching substring → exactly the matching record
        let hits: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/search?query=test_audio")
                .to_request(),
        )
        .await;
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["filename"], "test_audio.wav");

        // No matches → 200 with an empty list
        let none: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/search?query=nonexistent")
                .to_request(),
        )
        .await;
        assert!(none.as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_get_by_id_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), 1024).await;
        let app = test_app!(state);

        let req =
            multipart_request("/transcribe", &[("clip.wav", b"dummy audio data".as_slice())]);
        let created: Value = test::call_and_read_body_json(&app, req.to_request()).await;
        let id = created[0]["id"].as_i64().unwrap();

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/transcriptions/{}", id))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["id"].as_i64().unwrap(), id);
        assert_eq!(body["filename"], "clip.wav");
    }

    #[actix_web::test]
    async fn test_get_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), 1024).await;
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/transcriptions/424242")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Not found");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("424242"));
    }
}
