use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::params::transcription::UploadForm;
use crate::{AppState, Error};
use domain::pipeline::TranscriptionInput;
use domain::Id;
use log::*;

fn malformed_upload(err: MultipartError) -> Error {
    warn!("Rejecting malformed multipart upload: {err}");
    Error::validation(format!("malformed multipart upload: {}", err.body_text()))
}

async fn read_upload(mut multipart: Multipart) -> Result<TranscriptionInput, Error> {
    let mut input = TranscriptionInput::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await.map_err(malformed_upload)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                input.file_name = field.file_name().unwrap_or_default().to_string();
                input.audio = field.bytes().await.map_err(malformed_upload)?.to_vec();
                has_file = true;
            }
            "language" => input.language = Some(field.text().await.map_err(malformed_upload)?),
            "prompt" => input.prompt = Some(field.text().await.map_err(malformed_upload)?),
            "prefer_provider" => {
                input.prefer_provider = Some(field.text().await.map_err(malformed_upload)?)
            }
            other => debug!("Ignoring unknown multipart field: {other}"),
        }
    }

    if !has_file {
        return Err(Error::validation("multipart field `file` is required"));
    }
    Ok(input)
}

/// POST upload a recording and transcribe it
#[utoipa::path(
    post,
    path = "/sessions/{id}/transcription",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Transcribed; the session with its transcript", body = domain::sessions::Model),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session was already transcribed or transcription is running"),
        (status = 422, description = "Empty, oversized or unsupported recording"),
        (status = 502, description = "Every transcription provider failed"),
        (status = 503, description = "Transcription provider rejected our credentials or quota")
    )
)]
pub async fn create(
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    multipart: Multipart,
) -> Result<impl IntoResponse, Error> {
    let input = read_upload(multipart).await?;
    debug!(
        "POST transcription of session {id}: {} ({} bytes)",
        input.file_name,
        input.audio.len()
    );

    let session = app_state.orchestrator.transcribe(id, input, None).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), session)))
}
