use std::path::PathBuf;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderName},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::info;

use crate::{
    consts::QUEUE_POSITION_HEADER,
    error::ApiError,
    models::{Job, SigningOutcome},
    state::Services,
    util::tempfiles::{remove_quietly, sanitize_file_name, TempFileProvider},
};

const FILE_FIELD: &str = "file";

pub fn create_route(services: Services) -> Router {
    let body_limit = services.settings.max_upload_bytes;
    Router::new()
        .route("/sign", post(sign))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(services)
}

#[tracing::instrument(skip(services, headers, multipart))]
pub async fn sign(State(services): State<Services>, headers: HeaderMap, multipart: Result<Multipart, MultipartRejection>) -> Result<Response, ApiError> {
    authorize(&headers, services.settings.auth_token.as_deref())?;
    let multipart = multipart.map_err(|_| ApiError::MissingFile)?;
    let (path, original_name) = save_upload(&services.uploads, multipart).await?;

    let (job, receiver) = Job::new(path, &original_name);
    let position = services.queue.submit(job);

    match receiver.await {
        Ok(SigningOutcome::Signed(bytes)) => Ok(signed_response(&original_name, position, bytes)),
        Ok(SigningOutcome::Failed(reason)) => Err(ApiError::Signing(reason)),
        Err(_) => Err(ApiError::Internal("signing job ended without a result".to_string())),
    }
}

fn authorize(headers: &HeaderMap, auth_token: Option<&str>) -> Result<(), ApiError> {
    let auth_token = auth_token.ok_or(ApiError::Unauthorized)?;
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match provided {
        Some(provided) if provided == auth_token => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Streams the `file` field to a fresh upload file. Returns its path and the
/// sanitized client file name.
async fn save_upload(uploads: &TempFileProvider, mut multipart: Multipart) -> Result<(PathBuf, String), ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(|err| ApiError::Upload(err.to_string()))? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let original_name = sanitize_file_name(field.file_name().unwrap_or(FILE_FIELD));
        let path = uploads.get_path();
        let written = async {
            let mut file = File::create(&path).await.map_err(|err| err.to_string())?;
            let mut length = 0u64;
            while let Some(chunk) = field.chunk().await.map_err(|err| err.to_string())? {
                file.write_all(&chunk).await.map_err(|err| err.to_string())?;
                length += chunk.len() as u64;
            }
            file.flush().await.map_err(|err| err.to_string())?;
            Ok::<u64, String>(length)
        }
        .await;
        return match written {
            Ok(length) => {
                info!("Received {} with {} KiB", &original_name, length / 1024);
                Ok((path, original_name))
            }
            Err(err) => {
                remove_quietly(&path).await;
                Err(ApiError::Upload(err))
            }
        };
    }
    Err(ApiError::MissingFile)
}

fn signed_response(original_name: &str, position: usize, bytes: Bytes) -> Response {
    let headers = [
        (header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", original_name)),
        (HeaderName::from_static(QUEUE_POSITION_HEADER), position.to_string()),
    ];
    (headers, bytes).into_response()
}
